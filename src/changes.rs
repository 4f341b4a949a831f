//! `doc-changes`: write the latest changes into the docs changelog.

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::git::{CommitInfo, Repository};
use crate::project::detect_project;
use crate::ui;
use crate::version::latest_version;
use crate::warning::CiWarning;

/// Renders a changelog section, one bullet per commit summary.
pub fn render_section(heading: &str, commits: &[CommitInfo]) -> String {
    let mut section = format!("## {}\n\n", heading);
    for commit in commits {
        section.push_str(&format!("- {} `{}`\n", commit.summary(), commit.short_hash()));
    }
    section
}

/// Inserts `section` after the document title, or at the top when there is none.
pub fn prepend_section(existing: &str, section: &str) -> String {
    if existing.starts_with("# ") {
        let (title, rest) = match existing.find('\n') {
            Some(pos) => existing.split_at(pos + 1),
            None => (existing, ""),
        };
        let title = if title.ends_with('\n') {
            title.to_string()
        } else {
            format!("{}\n", title)
        };
        format!("{}\n{}\n{}", title, section, rest.trim_start_matches('\n'))
    } else if existing.is_empty() {
        section.to_string()
    } else {
        format!("{}\n{}", section, existing)
    }
}

/// Writes commits made since the latest version tag into the changelog file.
///
/// The section is headed by the project's current version when it is newer
/// than the latest tag, otherwise by `Unreleased`. Returns the number of
/// commits written.
pub fn doc_changes(repo: &dyn Repository, changelog_file: &Path) -> Result<usize> {
    let root = repo.workdir()?;
    let tags = repo.list_tags()?;
    let latest = latest_version(&tags);

    let commits = repo.commits_since_tag(latest.tag.as_deref())?;
    if commits.is_empty() {
        ui::display_warning(&CiWarning::NoNewCommits {
            latest_tag: latest.tag.unwrap_or_else(|| latest.version.to_string()),
        });
        return Ok(0);
    }

    let heading = detect_project(&root)
        .ok()
        .and_then(|project| crate::version::Version::parse(&project.version).ok())
        .filter(|version| *version > latest.version)
        .map(|version| version.to_string())
        .unwrap_or_else(|| "Unreleased".to_string());

    let path = if changelog_file.is_absolute() {
        changelog_file.to_path_buf()
    } else {
        root.join(changelog_file)
    };
    let existing = if path.exists() {
        fs::read_to_string(&path)?
    } else {
        String::new()
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, prepend_section(&existing, &render_section(&heading, &commits)))?;

    ui::display_success(&format!(
        "Wrote {} change(s) to {}",
        commits.len(),
        path.display()
    ));
    Ok(commits.len())
}
