//! Test-environment bootstrapping: running the test suite, linting, building
//! docs, installing packages from git, logging in test users, and preparing
//! database instances for CI runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::{Config, SessionConfig, TestUsersConfig};
use crate::db;
use crate::env::CiEnv;
use crate::error::{CiError, Result};
use crate::git::commands;
use crate::process::{Cmd, CommandRunner};
use crate::project::{detect_project, load_project_file};
use crate::ui;

fn run(runner: &dyn CommandRunner, cmd: Cmd) -> Result<()> {
    ui::display_command(&cmd);
    runner.run(&cmd)
}

/// `uv pip install`, with `--system` when running on CI.
fn pip_install<I, S>(ci_env: &CiEnv, args: I) -> Cmd
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let cmd = Cmd::new("uv").args(["pip", "install"]);
    let cmd = if ci_env.ci { cmd.arg("--system") } else { cmd };
    cmd.args(args)
}

/// Runs `pytest` with coverage for the package at `root`, then writes
/// `coverage.xml` when `coverage` is set.
pub fn run_pytest(
    runner: &dyn CommandRunner,
    root: &Path,
    coverage: bool,
    env: &HashMap<String, String>,
) -> Result<()> {
    let project = detect_project(root)?;
    let mut cmd = Cmd::new("pytest")
        .args(["-s", "tests/"])
        .arg(format!("--cov={}", project.module_name()))
        .args(["--cov-append", "--cov-report=term-missing"])
        .cwd(root);
    let mut vars: Vec<_> = env.iter().collect();
    vars.sort();
    for (key, value) in vars {
        cmd = cmd.env(key.clone(), value.clone());
    }
    run(runner, cmd)?;

    if coverage {
        run(runner, Cmd::new("coverage").arg("xml").cwd(root))?;
    }
    Ok(())
}

/// Installs pre-commit and runs every hook on all files.
pub fn run_pre_commit(runner: &dyn CommandRunner, ci_env: &CiEnv, root: &Path) -> Result<()> {
    run(runner, pip_install(ci_env, ["pre-commit"]).cwd(root))?;
    run(runner, Cmd::new("pre-commit").arg("install").cwd(root))?;
    run(runner, Cmd::new("pre-commit").args(["run", "--all-files"]).cwd(root))
}

/// Installs `lndocs` from `./lndocs` when present, else from `../lndocs`,
/// and builds the docs.
pub fn build_docs(
    runner: &dyn CommandRunner,
    ci_env: &CiEnv,
    root: &Path,
    strict: bool,
    strip_prefix: bool,
) -> Result<()> {
    let prefix = if root.join("lndocs").exists() { "." } else { ".." };
    run(runner, pip_install(ci_env, [format!("{}/lndocs", prefix)]).cwd(root))?;

    let mut cmd = Cmd::new("lndocs");
    if strict {
        cmd = cmd.arg("--strict");
    }
    if strip_prefix {
        cmd = cmd.arg("--strip-prefix");
    }
    run(runner, cmd.cwd(root))
}

/// Optional extras of a pip requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extras {
    None,
    /// A single extra or an already comma-joined list, without brackets.
    Raw(String),
    List(Vec<String>),
}

impl Extras {
    /// Parses a CLI value: empty means none, commas separate a list.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            None => Extras::None,
            Some(raw) if raw.contains(',') => {
                Extras::List(raw.split(',').map(|s| s.trim().to_string()).collect())
            }
            Some(raw) => Extras::Raw(raw.to_string()),
        }
    }

    /// The `[...]` suffix appended to the requirement.
    pub fn suffix(&self) -> Result<String> {
        match self {
            Extras::None => Ok(String::new()),
            Extras::Raw(raw) if raw.is_empty() => Ok(String::new()),
            Extras::Raw(raw) => {
                if raw.contains('[') || raw.contains(']') {
                    return Err(CiError::config(format!(
                        "Extras must not contain brackets: '{}'",
                        raw
                    )));
                }
                Ok(format!("[{}]", raw))
            }
            Extras::List(items) => Ok(format!("[{}]", items.join(","))),
        }
    }
}

/// Options of `install-git`.
#[derive(Debug, Clone, PartialEq)]
pub struct GitInstall {
    pub branch: String,
    pub extras: Extras,
    pub target_dir: String,
}

impl Default for GitInstall {
    fn default() -> Self {
        GitInstall {
            branch: "release".to_string(),
            extras: Extras::None,
            target_dir: "lamindb".to_string(),
        }
    }
}

/// Clones the configured repository and installs it with pip.
///
/// On branches other than `release`, the submodules are installed first
/// without dependencies so their development versions are used.
pub fn install_from_git(
    runner: &dyn CommandRunner,
    ci_env: &CiEnv,
    config: &SessionConfig,
    root: &Path,
    install: &GitInstall,
) -> Result<()> {
    let extras = install.extras.suffix()?;

    run(
        runner,
        commands::shallow_clone(&config.git_install_url, &install.branch, &install.target_dir).cwd(root),
    )?;

    if install.branch != "release" && !config.submodules.is_empty() {
        let submodules: Vec<String> = config
            .submodules
            .iter()
            .map(|sub| format!("./{}/{}", install.target_dir, sub))
            .collect();
        let cmd = pip_install(ci_env, ["--no-deps".to_string()]).args(submodules);
        run(runner, cmd.cwd(root))?;
    }

    run(
        runner,
        pip_install(ci_env, [format!("./{}{}", install.target_dir, extras)]).cwd(root),
    )
}

/// Fetches the test-user secret and returns the API key for `email`.
pub fn fetch_user_key(
    runner: &dyn CommandRunner,
    config: &TestUsersConfig,
    email: &str,
) -> Result<String> {
    let key_name = config.keys.get(email).ok_or_else(|| {
        CiError::config(format!("No API key configured for test user '{}'", email))
    })?;

    let cmd = Cmd::new("aws").args([
        "secretsmanager",
        "get-secret-value",
        "--secret-id",
        config.secret_id.as_str(),
        "--region",
        config.region.as_str(),
        "--query",
        "SecretString",
        "--output",
        "text",
    ]);
    let secret = runner.output(&cmd)?;
    let secrets: HashMap<String, String> = serde_json::from_str(secret.trim())?;

    secrets
        .get(key_name)
        .cloned()
        .ok_or_else(|| CiError::config(format!("Secret has no entry '{}'", key_name)))
}

/// The login command line. The key travels in the environment so it never
/// shows up in echoed commands, dry-run output or error messages.
pub fn login_command(config: &SessionConfig, key: &str) -> Result<Cmd> {
    Ok(Cmd::from_parts(&config.login_command)?.env(config.api_key_env.as_str(), key))
}

/// Logs a test user in with the key stored in the secrets manager.
pub fn login_test_user(runner: &dyn CommandRunner, config: &Config, email: &str) -> Result<()> {
    let key = fetch_user_key(runner, &config.test_users, email)?;
    let cmd = login_command(&config.session, &key)?;
    tracing::debug!(user = email, "logging in test user");
    runner.run(&cmd)?;
    ui::display_success(&format!("Logged in {}", email));
    Ok(())
}

/// Starts a postgres instance and initializes it from the base branch.
///
/// Checks out `GITHUB_BASE_REF` (when set), installs the package with its
/// test extras, initializes an instance against the new database, and
/// switches back to `GITHUB_HEAD_REF`. Returns the postgres URL.
pub fn setup_test_instance(
    runner: &dyn CommandRunner,
    ci_env: &CiEnv,
    config: &Config,
    root: &Path,
    schema: Option<&str>,
) -> Result<String> {
    let pg_url = db::setup_local_test_postgres(runner, &config.postgres, None, None)?;

    if let Some(base) = &ci_env.base_ref {
        run(runner, commands::switch(base).cwd(root))?;
    }
    run(runner, pip_install(ci_env, [".[test]"]).cwd(root))?;

    let project_file = root.join(&config.docs.project_file);
    let schema_handle = if project_file.exists() {
        load_project_file(&project_file)?.schema_handle
    } else {
        None
    };
    let schema = match schema {
        Some(schema) => Some(schema.to_string()),
        None => schema_handle.filter(|handle| handle != "core"),
    };

    let mut init = Cmd::from_parts(&config.session.init_command)?
        .args(["--storage", config.postgres.name.as_str(), "--db", pg_url.as_str()]);
    if let Some(schema) = schema {
        init = init.args(["--schema".to_string(), schema]);
    }
    run(runner, init.cwd(root))?;

    if let Some(head) = &ci_env.head_ref {
        run(runner, commands::switch(head).cwd(root))?;
    }
    Ok(pg_url)
}

/// Notebooks below `path`, or `path` itself when it is a notebook.
pub fn collect_notebooks(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(CiError::config(format!("{} does not exist", path.display())));
    }

    let mut notebooks: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".ipynb_checkpoints")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("ipynb"))
        .collect();
    notebooks.sort();
    Ok(notebooks)
}

/// Executes notebooks in place, writing outputs back into the files.
pub fn run_notebooks(runner: &dyn CommandRunner, path: &Path) -> Result<usize> {
    let notebooks = collect_notebooks(path)?;
    for notebook in &notebooks {
        run(
            runner,
            Cmd::new("jupyter").args([
                "nbconvert".to_string(),
                "--to".to_string(),
                "notebook".to_string(),
                "--execute".to_string(),
                "--inplace".to_string(),
                notebook.display().to_string(),
            ]),
        )?;
    }
    ui::display_success(&format!("Executed {} notebook(s)", notebooks.len()));
    Ok(notebooks.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extras_suffix() {
        assert_eq!(Extras::None.suffix().unwrap(), "");
        assert_eq!(Extras::Raw(String::new()).suffix().unwrap(), "");
        assert_eq!(Extras::Raw("bionty".to_string()).suffix().unwrap(), "[bionty]");
        assert_eq!(
            Extras::List(vec!["aws".to_string(), "bionty".to_string()])
                .suffix()
                .unwrap(),
            "[aws,bionty]"
        );
        assert!(Extras::Raw("[aws]".to_string()).suffix().is_err());
    }

    #[test]
    fn test_extras_parse() {
        assert_eq!(Extras::parse(None), Extras::None);
        assert_eq!(Extras::parse(Some("aws")), Extras::Raw("aws".to_string()));
        assert_eq!(
            Extras::parse(Some("aws, bionty")),
            Extras::List(vec!["aws".to_string(), "bionty".to_string()])
        );
    }

    #[test]
    fn test_pip_install_system_flag_on_ci() {
        let ci = CiEnv {
            ci: true,
            ..CiEnv::default()
        };
        assert_eq!(
            pip_install(&ci, ["pre-commit"]).to_string(),
            "uv pip install --system pre-commit"
        );
        assert_eq!(
            pip_install(&CiEnv::default(), ["pre-commit"]).to_string(),
            "uv pip install pre-commit"
        );
    }

    #[test]
    fn test_login_key_stays_out_of_command_line() {
        let cmd = login_command(&SessionConfig::default(), "SUPER-SECRET-KEY").unwrap();
        assert_eq!(cmd.to_string(), "lamin login");
        assert_eq!(
            cmd.env,
            vec![("LAMIN_API_KEY".to_string(), "SUPER-SECRET-KEY".to_string())]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_login_error_hides_key() {
        use crate::process::SystemRunner;

        let config = SessionConfig {
            login_command: vec!["false".to_string()],
            ..SessionConfig::default()
        };
        let cmd = login_command(&config, "SUPER-SECRET-KEY").unwrap();
        let err = SystemRunner::new().run(&cmd).unwrap_err();
        assert!(err.to_string().contains("exited with code"));
        assert!(!err.to_string().contains("SUPER-SECRET-KEY"));
    }
}
