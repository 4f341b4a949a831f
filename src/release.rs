//! The `release` workflow.
//!
//! Assumes the release commit was prepared by hand: the version number is
//! bumped in the package and the release notes are written. This module then
//! commits, tags, pushes, creates the GitHub release and optionally publishes
//! to the package index.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::config::{CompanionConfig, Config};
use crate::env::CiEnv;
use crate::error::{CiError, Result};
use crate::git::{commands, Repository};
use crate::github::{publish_github_release, ReleaseRequest};
use crate::process::{Cmd, CommandRunner};
use crate::project::{detect_project, Project, ProjectKind};
use crate::ui::{self, Prompt};
use crate::version::{latest_version, validate_version, Version};
use crate::warning::CiWarning;

/// Options of the `release` subcommand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReleaseArgs {
    /// Publish to the package index after tagging.
    pub pypi: bool,
    /// Link to the changelog entry, falls back to the configured default.
    pub changelog: Option<String>,
    /// Skip committing, tagging and the GitHub release, e.g. when the
    /// release was already created to obtain the changelog.
    pub no_release: bool,
}

/// Everything decided before anything is changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleasePlan {
    pub project: Project,
    pub previous: Version,
    pub version: Version,
    pub changelog: String,
    pub companion: Option<PathBuf>,
    pub companion_readme: Option<PathBuf>,
}

/// What a release run did.
#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseOutcome {
    Cancelled,
    Released {
        version: Version,
        tagged: bool,
        companion: bool,
        published: bool,
    },
}

fn readme_version() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Version: `[0-9.]+`").expect("readme version pattern is valid"))
}

/// Replaces every ``Version: `x.y.z` `` marker with the new version.
pub fn update_readme_version(path: &Path, version: &Version) -> Result<()> {
    let content = fs::read_to_string(path)?;
    let replacement = format!("Version: `{}`", version);
    let updated = readme_version().replace_all(&content, regex::NoExpand(&replacement));
    fs::write(path, updated.as_ref())?;
    Ok(())
}

fn companion_for<'a>(config: &'a Config, project: &Project) -> Option<&'a CompanionConfig> {
    config
        .release
        .companion
        .as_ref()
        .filter(|companion| companion.for_repo == project.repo_name)
}

/// Resolves the project and checks every release precondition.
pub fn plan_release(
    repo: &dyn Repository,
    config: &Config,
    root: &Path,
    args: &ReleaseArgs,
) -> Result<ReleasePlan> {
    let tags = repo.list_tags()?;
    let latest = latest_version(&tags);
    if !latest.skipped.is_empty() {
        tracing::debug!(skipped = ?latest.skipped, "ignoring non-version tags");
        ui::display_warning(&CiWarning::SkippedTags {
            tags: latest.skipped.clone(),
        });
    }
    let previous = latest.version;

    let project = detect_project(root)?;
    let root_name = crate::project::dir_name(root)?;
    if project.repo_name != root_name {
        return Err(CiError::release(format!(
            "Don't match: {} != {}",
            project.repo_name, root_name
        )));
    }
    let version = Version::parse(&project.version)?;

    if project.kind == ProjectKind::PythonPackage {
        validate_version(&version)?;
        if version <= previous {
            return Err(CiError::release(format!(
                "Your version ({}) should increment the previous version ({})",
                version, previous
            )));
        }
        if args.changelog.is_none() && config.release.require_changelog.contains(&project.name) {
            return Err(CiError::release(
                "Please pass a link to the changelog entry via: --changelog 'your-link'",
            ));
        }
        if root.join("LICENSE").exists() && !args.pypi {
            return Err(CiError::release(
                "Did you forget to add the `--pypi` flag? A LICENSE file exists and I assume this is an open-source package.",
            ));
        }
    }

    let (companion, companion_readme) = match companion_for(config, &project) {
        Some(companion) => {
            let parent = root.parent().ok_or_else(|| {
                CiError::release(format!("{} has no parent directory", root.display()))
            })?;
            let dir = parent.join(&companion.repo);
            if !dir.is_dir() {
                return Err(CiError::release(format!(
                    "Please clone the {} repository into the same parent directory as that of {}.",
                    companion.repo, project.repo_name
                )));
            }
            let readme = dir.join(&companion.readme);
            (Some(dir), Some(readme))
        }
        None => (None, None),
    };

    Ok(ReleasePlan {
        project,
        previous,
        version,
        changelog: args
            .changelog
            .clone()
            .unwrap_or_else(|| config.release.default_changelog.clone()),
        companion,
        companion_readme,
    })
}

fn run_all(runner: &dyn CommandRunner, cmds: &[Cmd]) -> Result<()> {
    for cmd in cmds {
        ui::display_command(cmd);
        runner.run(cmd)?;
    }
    Ok(())
}

/// Runs the full release: plan, confirm, tag and push, GitHub release,
/// companion repository, package index.
pub fn release(
    repo: &dyn Repository,
    runner: &dyn CommandRunner,
    prompt: &dyn Prompt,
    ci_env: &CiEnv,
    config: &Config,
    args: &ReleaseArgs,
) -> Result<ReleaseOutcome> {
    let root = repo.workdir()?;
    let plan = plan_release(repo, config, &root, args)?;

    ui::display_info(&format!("You will add this changelog link: {}", plan.changelog));
    ui::display_status(
        "This will run `git add -u`, commit everything into the release commit, add the release tags, and push to remote.",
    );
    ui::display_status(
        "Please ensure all your current changes should appear in the release commit. Typically, you only bump the version number.",
    );
    if let Some(dir) = &plan.companion {
        ui::display_info(&format!(
            "This will also update the version in {} and create a release there.",
            dir.display()
        ));
    }
    ui::display_version_bump(&plan.previous.to_string(), &plan.version.to_string());

    let pypi_msg = if args.pypi { " & publish to PyPI" } else { "" };
    if !prompt.confirm(&format!(
        "Commit and bump {} to {}{}?",
        plan.previous, plan.version, pypi_msg
    ))? {
        return Ok(ReleaseOutcome::Cancelled);
    }

    let org = &config.release.organization;
    let body = format!("See {}", plan.changelog);

    if !args.no_release {
        run_all(runner, &commands::release_commands(&plan.version, Some(&root)))?;

        let request = ReleaseRequest::new(
            format!("{}/{}", org, plan.project.repo_name),
            plan.version.clone(),
            &root,
        )
        .body(body.clone());
        publish_github_release(runner, prompt, ci_env, &request)?;
        ui::display_success(&format!("Released {} {}", plan.project.repo_name, plan.version));
    }

    if let (Some(dir), Some(readme)) = (&plan.companion, &plan.companion_readme) {
        update_readme_version(readme, &plan.version)?;
        run_all(runner, &commands::release_commands(&plan.version, Some(dir)))?;

        let name = crate::project::dir_name(dir)?;
        let request = ReleaseRequest::new(format!("{}/{}", org, name), plan.version.clone(), dir)
            .body(body.clone())
            .generate_notes(false);
        publish_github_release(runner, prompt, ci_env, &request)?;
        ui::display_success(&format!("Released {} {}", name, plan.version));
    }

    if args.pypi {
        let cmd = Cmd::from_parts(&config.release.publish_command)?.cwd(&root);
        run_all(runner, &[cmd])?;
        ui::display_success(&format!("Published {} to PyPI", plan.version));
    }

    Ok(ReleaseOutcome::Released {
        version: plan.version,
        tagged: !args.no_release,
        companion: plan.companion.is_some(),
        published: args.pypi,
    })
}
