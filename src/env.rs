//! CI environment as exposed by GitHub Actions.

use std::env;

/// Snapshot of the CI-related environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CiEnv {
    /// `GITHUB_EVENT_NAME`, e.g. `push` or `pull_request`
    pub event_name: Option<String>,
    /// `GITHUB_TOKEN`
    pub github_token: Option<String>,
    /// `CI` is set to anything non-empty
    pub ci: bool,
    /// `GITHUB_BASE_REF`, the target branch of a pull request
    pub base_ref: Option<String>,
    /// `GITHUB_HEAD_REF`, the source branch of a pull request
    pub head_ref: Option<String>,
    /// `GITHUB_API_URL`, the REST endpoint of the GitHub instance
    pub api_url: Option<String>,
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

impl CiEnv {
    pub fn from_env() -> Self {
        CiEnv {
            event_name: non_empty("GITHUB_EVENT_NAME"),
            github_token: non_empty("GITHUB_TOKEN"),
            ci: non_empty("CI").is_some(),
            base_ref: non_empty("GITHUB_BASE_REF"),
            head_ref: non_empty("GITHUB_HEAD_REF"),
            api_url: non_empty("GITHUB_API_URL"),
        }
    }

    pub fn is_event(&self, name: &str) -> bool {
        self.event_name.as_deref() == Some(name)
    }
}
