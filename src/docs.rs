//! Docs artifacts: packaging the docs sources into a zip archive, uploading it
//! to object storage, and rearranging built HTML for deployment.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::config::DocsConfig;
use crate::env::CiEnv;
use crate::error::{CiError, Result};
use crate::process::{Cmd, CommandRunner};
use crate::project::{dir_name, load_project_file};
use crate::ui;
use crate::warning::CiWarning;

const CHECKPOINTS: &str = ".ipynb_checkpoints";

fn has_allowed_suffix(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|allowed| allowed == ext))
        .unwrap_or(false)
}

fn archive_name(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Writes `readme` plus every docs file with an allowed suffix into `zip_path`.
///
/// Files are stored relative to `docs_dir`, so `docs/guide/intro.md` lands at
/// `guide/intro.md`. Notebook checkpoint directories are skipped. Returns the
/// archive entry names in the order they were written.
pub fn zip_docs_dir(
    zip_path: &Path,
    readme: &Path,
    docs_dir: &Path,
    extensions: &[String],
) -> Result<Vec<String>> {
    let mut writer = ZipWriter::new(File::create(zip_path)?);
    let options = SimpleFileOptions::default();
    let mut entries = Vec::new();

    let readme_name = readme
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "README.md".to_string());
    writer.start_file(readme_name.as_str(), options)?;
    writer.write_all(&fs::read(readme)?)?;
    entries.push(readme_name);

    let mut files: Vec<PathBuf> = WalkDir::new(docs_dir)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != CHECKPOINTS)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| CiError::docs(format!("Cannot walk {}: {}", docs_dir.display(), e)))?
        .into_iter()
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| has_allowed_suffix(path, extensions))
        .collect();
    files.sort();

    for path in files {
        let relative = path
            .strip_prefix(docs_dir)
            .map_err(|e| CiError::docs(format!("{}: {}", path.display(), e)))?;
        let name = archive_name(relative);
        writer.start_file(name.as_str(), options)?;
        io::copy(&mut File::open(&path)?, &mut writer)?;
        entries.push(name);
    }

    writer.finish()?;
    Ok(entries)
}

/// Archives the docs of the repository at `root` into `<root>/<repo>.zip`.
///
/// The directory name is the repository name; it must be a lower-case name
/// without dots and the directory must be a git repository.
pub fn zip_docs(root: &Path, docs_dir: &Path, config: &DocsConfig) -> Result<(String, PathBuf)> {
    let repo_name = dir_name(root)?;
    if repo_name.contains('.') {
        return Err(CiError::docs(format!(
            "Repository directory '{}' must not contain a '.'",
            repo_name
        )));
    }
    if !root.join(".git").exists() {
        return Err(CiError::docs(format!("{} is not a git repository", root.display())));
    }
    if repo_name.to_lowercase() != repo_name {
        return Err(CiError::docs(format!(
            "Repository directory '{}' must be lower-case",
            repo_name
        )));
    }

    let zip_path = root.join(format!("{}.zip", repo_name));
    let entries = zip_docs_dir(&zip_path, &root.join("README.md"), docs_dir, &config.extensions)?;
    tracing::debug!(archive = %zip_path.display(), entries = entries.len(), "zipped docs");
    Ok((repo_name, zip_path))
}

/// Options of the `upload-docs` subcommand.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadArgs {
    pub docs_dir: PathBuf,
    /// Upload even though this is not a push event.
    pub in_pr: bool,
}

impl Default for UploadArgs {
    fn default() -> Self {
        UploadArgs {
            docs_dir: PathBuf::from("./docs"),
            in_pr: false,
        }
    }
}

fn upload_allowed(ci_env: &CiEnv, in_pr: bool) -> bool {
    in_pr || ci_env.is_event("push") || ci_env.is_event("repository_dispatch")
}

/// Zips the docs and copies the archive to the docs bucket.
///
/// Returns the uploaded object name, or `None` when the event does not call
/// for an upload. Falls back to `lamin save` when the AWS CLI is missing.
pub fn upload_docs_artifact(
    runner: &dyn CommandRunner,
    ci_env: &CiEnv,
    config: &DocsConfig,
    root: &Path,
    args: &UploadArgs,
) -> Result<Option<String>> {
    if !upload_allowed(ci_env, args.in_pr) {
        ui::display_warning(&CiWarning::UploadSkipped {
            event: ci_env.event_name.clone(),
        });
        return Ok(None);
    }

    let docs_dir = if args.docs_dir.is_absolute() {
        args.docs_dir.clone()
    } else {
        root.join(&args.docs_dir)
    };
    let (_, zip_path) = zip_docs(root, &docs_dir, config)?;
    let zip_name = zip_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CiError::docs("Archive has no file name"))?;

    let cmd = if runner.is_available("aws") {
        Cmd::new("aws").args([
            "s3".to_string(),
            "cp".to_string(),
            zip_name.clone(),
            format!("{}/{}", config.bucket.trim_end_matches('/'), zip_name),
        ])
    } else {
        let cmd = Cmd::new("lamin").args([
            "save".to_string(),
            zip_name.clone(),
            "--key".to_string(),
            format!("docs/{}", zip_name),
        ]);
        ui::display_warning(&CiWarning::AwsCliUnavailable {
            fallback: cmd.to_string(),
        });
        cmd
    };

    let cmd = cmd.cwd(root);
    ui::display_command(&cmd);
    runner.run(&cmd)?;
    ui::display_success(&format!("Uploaded docs artifact {}", zip_name));
    Ok(Some(zip_name))
}

/// Where built HTML ends up below `_build/html`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocsLayout {
    /// `_build/html/<slug>`
    Slug,
    /// `_build/html/docs/<slug>`
    DocsSlug,
}

/// Moves `_build/html` below the project slug on push events.
///
/// Returns the new location of the built HTML, or `None` when skipped.
pub fn move_built_docs(
    ci_env: &CiEnv,
    config: &DocsConfig,
    root: &Path,
    layout: DocsLayout,
) -> Result<Option<PathBuf>> {
    if !ci_env.is_event("push") {
        ui::display_warning(&CiWarning::DocsMoveSkipped {
            event: ci_env.event_name.clone(),
        });
        return Ok(None);
    }

    let project_file = load_project_file(&root.join(&config.project_file))?;
    let slug = project_file.project_slug.ok_or_else(|| {
        CiError::docs(format!("No project_slug in {}", config.project_file))
    })?;

    let build = root.join("_build");
    let html = build.join("html");
    if !html.is_dir() {
        return Err(CiError::docs(format!("{} does not exist", html.display())));
    }

    let staging = build.join(format!("{}.relkit-staging", slug));
    fs::rename(&html, &staging)?;

    let parent = match layout {
        DocsLayout::Slug => html.clone(),
        DocsLayout::DocsSlug => html.join("docs"),
    };
    fs::create_dir_all(&parent)?;
    let target = parent.join(&slug);
    fs::rename(&staging, &target)?;

    ui::display_success(&format!("Moved built docs to {}", target.display()));
    Ok(Some(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_allowed_suffix_is_case_sensitive() {
        let extensions = vec!["md".to_string(), "R".to_string()];
        assert!(has_allowed_suffix(Path::new("a/b.md"), &extensions));
        assert!(has_allowed_suffix(Path::new("analysis.R"), &extensions));
        assert!(!has_allowed_suffix(Path::new("analysis.r"), &extensions));
        assert!(!has_allowed_suffix(Path::new("Makefile"), &extensions));
    }

    #[test]
    fn test_upload_allowed() {
        let push = CiEnv {
            event_name: Some("push".to_string()),
            ..CiEnv::default()
        };
        let dispatch = CiEnv {
            event_name: Some("repository_dispatch".to_string()),
            ..CiEnv::default()
        };
        let pr = CiEnv {
            event_name: Some("pull_request".to_string()),
            ..CiEnv::default()
        };
        assert!(upload_allowed(&push, false));
        assert!(upload_allowed(&dispatch, false));
        assert!(!upload_allowed(&pr, false));
        assert!(upload_allowed(&pr, true));
        assert!(!upload_allowed(&CiEnv::default(), false));
    }
}
