//! Git operations
//!
//! Reads (tags, commit history) go through the [Repository] trait, backed by
//! `git2` in [repository::Git2Repository] and by [mock::MockRepository] in
//! tests. Writes that must honour the user's git configuration (commit hooks,
//! credentials, signing) are shelled out as plain `git` commands built by
//! [commands].
//!
//! ```rust,no_run
//! # use relkit::git::{Git2Repository, Repository};
//! # fn example() -> relkit::Result<()> {
//! let repo = Git2Repository::open(".")?;
//! for tag in repo.list_tags()? {
//!     println!("{}", tag);
//! }
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod mock;
pub mod repository;

pub use mock::MockRepository;
pub use repository::Git2Repository;

use std::path::PathBuf;

use crate::error::Result;

/// Commit information used for changelog entries
#[derive(Debug, Clone, PartialEq)]
pub struct CommitInfo {
    /// The full commit hash
    pub hash: String,
    /// The commit message
    pub message: String,
    /// The commit author
    pub author: String,
}

impl CommitInfo {
    /// First line of the commit message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }

    pub fn short_hash(&self) -> &str {
        if self.hash.len() > 7 {
            &self.hash[..7]
        } else {
            &self.hash
        }
    }
}

/// Read-only repository queries.
///
/// All implementors must be `Send + Sync`. Implementations map underlying
/// errors (like `git2::Error`) to [crate::error::CiError] variants.
pub trait Repository: Send + Sync {
    /// All tag names in the repository.
    fn list_tags(&self) -> Result<Vec<String>>;

    /// Commits reachable from HEAD but not from `tag`, oldest first.
    ///
    /// With `tag` set to `None` the whole history of HEAD is returned.
    ///
    /// # Returns
    /// * `Ok(Vec<CommitInfo>)` - Commits in chronological order
    /// * `Err` - If the tag does not exist or the history cannot be walked
    fn commits_since_tag(&self, tag: Option<&str>) -> Result<Vec<CommitInfo>>;

    /// Root of the working tree.
    fn workdir(&self) -> Result<PathBuf>;
}
