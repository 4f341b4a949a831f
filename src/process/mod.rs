//! External command execution
//!
//! Every tool relkit drives (git, gh, docker, pytest, the AWS CLI, ...) is
//! invoked through the [CommandRunner] trait so workflows can be exercised
//! against [mock::RecordingRunner] in tests.
//!
//! - [SystemRunner]: spawns real processes, optionally printing instead of
//!   running mutating commands (`--dry-run`)
//! - [mock::RecordingRunner]: records commands and replays canned output

pub mod mock;

pub use mock::RecordingRunner;

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{CiError, Result};

/// A command line to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Cmd {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    /// Build a command from a program-plus-arguments list such as a
    /// configured `["flit", "publish"]`.
    pub fn from_parts(parts: &[String]) -> Result<Self> {
        let (program, args) = parts
            .split_first()
            .ok_or_else(|| CiError::config("Command must not be empty"))?;
        Ok(Cmd::new(program.clone()).args(args))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Runs external commands.
///
/// Implementors must be `Send + Sync`. Both execution methods fail with
/// [CiError::Command] when the program cannot be spawned or exits non-zero.
pub trait CommandRunner: Send + Sync {
    /// Run a command with inherited stdio.
    fn run(&self, cmd: &Cmd) -> Result<()>;

    /// Run a command and capture its standard output.
    ///
    /// Output queries are read-only, so they run even in dry-run mode.
    fn output(&self, cmd: &Cmd) -> Result<String>;

    /// Whether `program` can be found on `PATH`.
    fn is_available(&self, program: &str) -> bool;
}

/// Spawns real processes.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    dry_run: bool,
}

impl SystemRunner {
    pub fn new() -> Self {
        SystemRunner { dry_run: false }
    }

    pub fn dry_run() -> Self {
        SystemRunner { dry_run: true }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn command(cmd: &Cmd) -> Command {
        let mut command = Command::new(&cmd.program);
        command.args(&cmd.args);
        if let Some(dir) = &cmd.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &cmd.env {
            command.env(key, value);
        }
        command
    }
}

fn spawn_error(cmd: &Cmd, err: std::io::Error) -> CiError {
    CiError::command(format!("Failed to execute `{}`: {}", cmd, err))
}

fn status_error(cmd: &Cmd, code: Option<i32>, stderr: &str) -> CiError {
    let mut msg = format!("`{}` exited with code {}", cmd, code.unwrap_or(-1));
    if !stderr.trim().is_empty() {
        msg.push_str(&format!("\nStderr: {}", stderr.trim()));
    }
    CiError::command(msg)
}

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &Cmd) -> Result<()> {
        if self.dry_run {
            println!("[dry-run] {}", cmd);
            return Ok(());
        }

        tracing::debug!(command = %cmd, cwd = ?cmd.cwd, "running command");
        let status = Self::command(cmd)
            .status()
            .map_err(|e| spawn_error(cmd, e))?;

        if !status.success() {
            return Err(status_error(cmd, status.code(), ""));
        }
        Ok(())
    }

    fn output(&self, cmd: &Cmd) -> Result<String> {
        tracing::debug!(command = %cmd, cwd = ?cmd.cwd, "capturing command output");
        let output = Self::command(cmd)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(cmd, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(status_error(cmd, output.status.code(), &stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}
