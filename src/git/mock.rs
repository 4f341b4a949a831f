use crate::error::{CiError, Result};
use crate::git::{CommitInfo, Repository};
use std::path::PathBuf;

/// Mock repository for testing without actual git operations
#[derive(Debug, Clone)]
pub struct MockRepository {
    tags: Vec<(String, usize)>,
    commits: Vec<CommitInfo>,
    workdir: PathBuf,
}

impl MockRepository {
    /// Create a new empty mock repository rooted at `workdir`
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        MockRepository {
            tags: Vec::new(),
            commits: Vec::new(),
            workdir: workdir.into(),
        }
    }

    /// Append a commit on top of HEAD
    pub fn add_commit(&mut self, message: &str) {
        let index = self.commits.len();
        self.commits.push(CommitInfo {
            hash: format!("{:040x}", index + 1),
            message: message.to_string(),
            author: "Test User".to_string(),
        });
    }

    /// Tag the current HEAD
    pub fn add_tag(&mut self, name: impl Into<String>) {
        self.tags.push((name.into(), self.commits.len()));
    }
}

impl Repository for MockRepository {
    fn list_tags(&self) -> Result<Vec<String>> {
        Ok(self.tags.iter().map(|(name, _)| name.clone()).collect())
    }

    fn commits_since_tag(&self, tag: Option<&str>) -> Result<Vec<CommitInfo>> {
        let start = match tag {
            Some(name) => self
                .tags
                .iter()
                .find(|(tag_name, _)| tag_name == name)
                .map(|(_, position)| *position)
                .ok_or_else(|| CiError::version(format!("Cannot find tag '{}'", name)))?,
            None => 0,
        };
        Ok(self.commits[start..].to_vec())
    }

    fn workdir(&self) -> Result<PathBuf> {
        Ok(self.workdir.clone())
    }
}
