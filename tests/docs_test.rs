// tests/docs_test.rs
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use relkit::config::DocsConfig;
use relkit::docs::{move_built_docs, upload_docs_artifact, zip_docs, zip_docs_dir, DocsLayout, UploadArgs};
use relkit::env::CiEnv;
use relkit::process::RecordingRunner;
use tempfile::TempDir;

fn docs_repo(parent: &Path, name: &str) -> PathBuf {
    let root = parent.join(name);
    fs::create_dir_all(root.join(".git")).unwrap();
    fs::create_dir_all(root.join("docs/guide/.ipynb_checkpoints")).unwrap();
    fs::write(root.join("README.md"), "# readme").unwrap();
    fs::write(root.join("docs/index.md"), "# docs").unwrap();
    fs::write(root.join("docs/guide/intro.ipynb"), "{}").unwrap();
    fs::write(root.join("docs/guide/.ipynb_checkpoints/intro-checkpoint.ipynb"), "{}").unwrap();
    fs::write(root.join("docs/guide/plot.png"), [0u8, 1, 2]).unwrap();
    fs::write(root.join("docs/conf.toml"), "ignored").unwrap();
    root
}

fn push_event() -> CiEnv {
    CiEnv {
        event_name: Some("push".to_string()),
        ..CiEnv::default()
    }
}

fn archive_names(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

#[test]
fn test_zip_docs_dir_filters_by_extension() {
    let dir = TempDir::new().unwrap();
    let root = docs_repo(dir.path(), "lamin-utils");
    let zip_path = dir.path().join("out.zip");

    let entries = zip_docs_dir(
        &zip_path,
        &root.join("README.md"),
        &root.join("docs"),
        &DocsConfig::default().extensions,
    )
    .unwrap();

    assert_eq!(entries[0], "README.md");
    assert_eq!(
        archive_names(&zip_path),
        vec!["README.md", "guide/intro.ipynb", "guide/plot.png", "index.md"]
    );
}

#[test]
fn test_zip_docs_names_archive_after_repo() {
    let dir = TempDir::new().unwrap();
    let root = docs_repo(dir.path(), "lamin-utils");

    let (name, zip_path) = zip_docs(&root, &root.join("docs"), &DocsConfig::default()).unwrap();
    assert_eq!(name, "lamin-utils");
    assert_eq!(zip_path, root.join("lamin-utils.zip"));
    assert!(zip_path.exists());
}

#[test]
fn test_zip_docs_rejects_bad_directories() {
    let dir = TempDir::new().unwrap();
    let config = DocsConfig::default();

    let dotted = docs_repo(dir.path(), "lamin.utils");
    assert!(zip_docs(&dotted, &dotted.join("docs"), &config)
        .unwrap_err()
        .to_string()
        .contains("'.'"));

    let upper = docs_repo(dir.path(), "LaminUtils");
    assert!(zip_docs(&upper, &upper.join("docs"), &config)
        .unwrap_err()
        .to_string()
        .contains("lower-case"));

    let no_git = dir.path().join("plain");
    fs::create_dir_all(no_git.join("docs")).unwrap();
    fs::write(no_git.join("README.md"), "").unwrap();
    assert!(zip_docs(&no_git, &no_git.join("docs"), &config)
        .unwrap_err()
        .to_string()
        .contains("not a git repository"));
}

#[test]
fn test_upload_uses_aws_cli() {
    let dir = TempDir::new().unwrap();
    let root = docs_repo(dir.path(), "lamin-utils");
    let runner = RecordingRunner::new();

    let uploaded = upload_docs_artifact(
        &runner,
        &push_event(),
        &DocsConfig::default(),
        &root,
        &UploadArgs::default(),
    )
    .unwrap();

    assert_eq!(uploaded.as_deref(), Some("lamin-utils.zip"));
    assert_eq!(
        runner.lines(),
        vec!["aws s3 cp lamin-utils.zip s3://lamin-site-assets/docs/lamin-utils.zip"]
    );
}

#[test]
fn test_upload_falls_back_to_lamin_save() {
    let dir = TempDir::new().unwrap();
    let root = docs_repo(dir.path(), "lamin-utils");
    let runner = RecordingRunner::new().without_program("aws");

    upload_docs_artifact(
        &runner,
        &push_event(),
        &DocsConfig::default(),
        &root,
        &UploadArgs::default(),
    )
    .unwrap();

    assert_eq!(
        runner.lines(),
        vec!["lamin save lamin-utils.zip --key docs/lamin-utils.zip"]
    );
}

#[test]
fn test_upload_skipped_on_pull_request() {
    let dir = TempDir::new().unwrap();
    let root = docs_repo(dir.path(), "lamin-utils");
    let runner = RecordingRunner::new();
    let pr = CiEnv {
        event_name: Some("pull_request".to_string()),
        ..CiEnv::default()
    };

    let uploaded =
        upload_docs_artifact(&runner, &pr, &DocsConfig::default(), &root, &UploadArgs::default())
            .unwrap();
    assert!(uploaded.is_none());
    assert!(runner.calls().is_empty());
    assert!(!root.join("lamin-utils.zip").exists());

    let args = UploadArgs {
        in_pr: true,
        ..UploadArgs::default()
    };
    let uploaded = upload_docs_artifact(&runner, &pr, &DocsConfig::default(), &root, &args).unwrap();
    assert!(uploaded.is_some());
}

fn built_site(parent: &Path) -> PathBuf {
    let root = parent.join("site");
    fs::create_dir_all(root.join("_build/html")).unwrap();
    fs::write(root.join("_build/html/index.html"), "<html></html>").unwrap();
    fs::write(root.join("lamin-project.yaml"), "project_slug: lamindb\n").unwrap();
    root
}

#[test]
fn test_move_built_docs_below_slug() {
    let dir = TempDir::new().unwrap();
    let root = built_site(dir.path());

    let target = move_built_docs(&push_event(), &DocsConfig::default(), &root, DocsLayout::Slug)
        .unwrap()
        .unwrap();
    assert_eq!(target, root.join("_build/html/lamindb"));
    assert!(root.join("_build/html/lamindb/index.html").exists());
    assert!(!root.join("_build/html/index.html").exists());
}

#[test]
fn test_move_built_docs_below_docs_slug() {
    let dir = TempDir::new().unwrap();
    let root = built_site(dir.path());

    move_built_docs(&push_event(), &DocsConfig::default(), &root, DocsLayout::DocsSlug).unwrap();
    assert!(root.join("_build/html/docs/lamindb/index.html").exists());
}

#[test]
fn test_move_built_docs_skipped_outside_push() {
    let dir = TempDir::new().unwrap();
    let root = built_site(dir.path());

    let moved =
        move_built_docs(&CiEnv::default(), &DocsConfig::default(), &root, DocsLayout::Slug).unwrap();
    assert!(moved.is_none());
    assert!(root.join("_build/html/index.html").exists());
}
