//! GitHub release publishing.
//!
//! The GitHub CLI is preferred because it reuses whatever authentication the
//! developer already has; the REST API is the fallback when `gh` is missing.

use std::path::PathBuf;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Serialize;

use crate::env::CiEnv;
use crate::error::{CiError, Result};
use crate::process::{Cmd, CommandRunner};
use crate::project::dir_name;
use crate::ui::{self, Prompt};
use crate::version::Version;
use crate::warning::CiWarning;

const GITHUB_API: &str = "https://api.github.com";

/// A release to create on GitHub.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseRequest {
    /// `owner/name`
    pub repo: String,
    pub version: Version,
    pub title: String,
    pub body: String,
    pub draft: bool,
    pub generate_notes: bool,
    /// Local clone of `repo`.
    pub cwd: PathBuf,
}

impl ReleaseRequest {
    pub fn new(repo: impl Into<String>, version: Version, cwd: impl Into<PathBuf>) -> Self {
        let title = format!("Release {}", version);
        ReleaseRequest {
            repo: repo.into(),
            version,
            title,
            body: String::new(),
            draft: false,
            generate_notes: true,
            cwd: cwd.into(),
        }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn generate_notes(mut self, generate: bool) -> Self {
        self.generate_notes = generate;
        self
    }

    /// Repository part of `owner/name`; a bare name is returned unchanged.
    pub fn repo_short_name(&self) -> &str {
        self.repo.split('/').nth(1).unwrap_or(&self.repo)
    }
}

pub trait ReleasePublisher {
    fn publish(&self, request: &ReleaseRequest) -> Result<()>;
}

/// Publishes through `gh release create`.
pub struct GhCli<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> GhCli<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        GhCli { runner }
    }

    /// Checks that `gh` is installed and runs.
    pub fn check_available(&self, request: &ReleaseRequest) -> Result<()> {
        if !self.runner.is_available("gh") {
            return Err(CiError::command("`gh` not found on PATH"));
        }
        self.runner
            .output(&Cmd::new("gh").arg("--version").cwd(&request.cwd))
            .map(|_| ())
    }

    pub fn command(request: &ReleaseRequest) -> Cmd {
        let mut cmd = Cmd::new("gh")
            .args(["release", "create"])
            .arg(request.version.to_string())
            .args(["--title", request.title.as_str(), "--notes", request.body.as_str()]);
        if request.generate_notes {
            cmd = cmd.arg("--generate-notes");
        }
        if request.version.is_prerelease() {
            cmd = cmd.arg("--prerelease");
        }
        if request.draft {
            cmd = cmd.arg("--draft");
        }
        cmd.cwd(&request.cwd)
    }
}

impl ReleasePublisher for GhCli<'_> {
    fn publish(&self, request: &ReleaseRequest) -> Result<()> {
        let cmd = Self::command(request);
        ui::display_command(&cmd);
        self.runner.run(&cmd).map_err(|e| {
            CiError::release(format!("Error creating GitHub release using `gh`: {}", e))
        })
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct CreateRelease<'a> {
    tag_name: String,
    name: &'a str,
    body: &'a str,
    draft: bool,
    prerelease: bool,
    generate_release_notes: bool,
}

impl<'a> From<&'a ReleaseRequest> for CreateRelease<'a> {
    fn from(request: &'a ReleaseRequest) -> Self {
        CreateRelease {
            tag_name: request.version.to_string(),
            name: &request.title,
            body: &request.body,
            draft: request.draft,
            prerelease: request.version.is_prerelease(),
            generate_release_notes: request.generate_notes,
        }
    }
}

/// Publishes through the GitHub REST API.
pub struct GitHubApi {
    client: Client,
    base_url: String,
}

impl GitHubApi {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(token, GITHUB_API)
    }

    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("relkit"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        let auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|e| CiError::github(format!("Invalid token: {}", e)))?;
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder().default_headers(headers).build()?;

        Ok(GitHubApi {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn releases_url(&self, repo: &str) -> String {
        format!("{}/repos/{}/releases", self.base_url, repo)
    }
}

impl ReleasePublisher for GitHubApi {
    fn publish(&self, request: &ReleaseRequest) -> Result<()> {
        let url = self.releases_url(&request.repo);
        tracing::debug!(%url, tag = %request.version, "creating release through the REST API");

        let response = self
            .client
            .post(&url)
            .json(&CreateRelease::from(request))
            .send()?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().unwrap_or_default();
            return Err(CiError::github(format!(
                "Error creating GitHub release for {} ({}): {}",
                request.repo, status, text
            )));
        }
        Ok(())
    }
}

/// Creates a GitHub release, preferring `gh` and falling back to the REST API.
///
/// The repository name in `request.repo` must match the directory the
/// release is created from, so a release never lands in the wrong repository.
pub fn publish_github_release(
    runner: &dyn CommandRunner,
    prompt: &dyn Prompt,
    ci_env: &CiEnv,
    request: &ReleaseRequest,
) -> Result<()> {
    let cwd_name = dir_name(&request.cwd)?;
    if request.repo_short_name() != cwd_name {
        return Err(CiError::release(format!(
            "Don't match: {} != {}",
            request.repo_short_name(),
            cwd_name
        )));
    }

    let gh = GhCli::new(runner);
    match gh.check_available(request) {
        Ok(()) => gh.publish(request),
        Err(reason) => {
            ui::display_warning(&CiWarning::GhUnavailable {
                reason: reason.to_string(),
            });
            let token = match &ci_env.github_token {
                Some(token) => token.clone(),
                None => prompt.input("GitHub token")?,
            };
            if token.is_empty() {
                return Err(CiError::github(
                    "Neither the GitHub CLI ('gh') nor a GitHub token is available",
                ));
            }
            let base_url = ci_env.api_url.as_deref().unwrap_or(GITHUB_API);
            GitHubApi::with_base_url(&token, base_url)?.publish(request)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::RecordingRunner;
    use crate::ui::ScriptedPrompt;

    fn request(version: &str) -> ReleaseRequest {
        ReleaseRequest::new(
            "laminlabs/lamin-utils",
            Version::parse(version).unwrap(),
            "/work/lamin-utils",
        )
        .body("See https://docs.lamin.ai/changelog")
    }

    #[test]
    fn test_gh_command_for_final_release() {
        let cmd = GhCli::command(&request("0.13.2"));
        assert_eq!(
            cmd.to_string(),
            "gh release create 0.13.2 --title 'Release 0.13.2' --notes 'See https://docs.lamin.ai/changelog' --generate-notes"
        );
    }

    #[test]
    fn test_gh_command_for_prerelease_without_notes() {
        let cmd = GhCli::command(&request("0.14rc1").generate_notes(false));
        assert!(cmd.args.contains(&"--prerelease".to_string()));
        assert!(!cmd.args.contains(&"--generate-notes".to_string()));
    }

    #[test]
    fn test_repo_name_must_match_directory() {
        let runner = RecordingRunner::new();
        let mut req = request("0.13.2");
        req.cwd = PathBuf::from("/work/other-dir");

        let err = publish_github_release(&runner, &ScriptedPrompt::default(), &CiEnv::default(), &req)
            .unwrap_err();
        assert!(err.to_string().contains("Don't match"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_publishes_with_gh_when_available() {
        let runner = RecordingRunner::new().with_output("gh --version", "gh version 2.40.0");
        publish_github_release(
            &runner,
            &ScriptedPrompt::default(),
            &CiEnv::default(),
            &request("0.13.2"),
        )
        .unwrap();

        let lines = runner.lines();
        assert_eq!(lines[0], "gh --version");
        assert!(lines[1].starts_with("gh release create 0.13.2"));
    }

    #[test]
    fn test_gh_failure_is_not_retried_through_api() {
        let runner = RecordingRunner::new().failing("gh release");
        let err = publish_github_release(
            &runner,
            &ScriptedPrompt::default(),
            &CiEnv::default(),
            &request("0.13.2"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("using `gh`"));
    }

    #[test]
    fn test_fallback_without_token_fails() {
        let runner = RecordingRunner::new().without_program("gh");
        let err = publish_github_release(
            &runner,
            &ScriptedPrompt::new([""]),
            &CiEnv::default(),
            &request("0.13.2"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Neither the GitHub CLI"));
    }

    #[test]
    fn test_api_payload() {
        let req = request("0.14a2").generate_notes(false);
        let payload = serde_json::to_value(CreateRelease::from(&req)).unwrap();
        assert_eq!(payload["tag_name"], "0.14a2");
        assert_eq!(payload["name"], "Release 0.14a2");
        assert_eq!(payload["prerelease"], true);
        assert_eq!(payload["generate_release_notes"], false);
        assert_eq!(payload["draft"], false);
    }

    #[test]
    fn test_releases_url() {
        let api = GitHubApi::with_base_url("token", "https://github.example.com/api/v3/").unwrap();
        assert_eq!(
            api.releases_url("laminlabs/lamindb"),
            "https://github.example.com/api/v3/repos/laminlabs/lamindb/releases"
        );
    }
}
