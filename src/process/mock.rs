use std::sync::Mutex;

use crate::error::{CiError, Result};
use crate::process::{Cmd, CommandRunner};

/// Command runner for testing that records every command instead of running it.
///
/// Commands are matched by prefix of their display form, e.g. `"gh release"`
/// matches `gh release create 0.1.2 ...`.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Cmd>>,
    outputs: Vec<(String, String)>,
    failing: Vec<String>,
    missing: Vec<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `stdout` to commands starting with `prefix`.
    pub fn with_output(mut self, prefix: &str, stdout: &str) -> Self {
        self.outputs.push((prefix.to_string(), stdout.to_string()));
        self
    }

    /// Fail commands starting with `prefix`.
    pub fn failing(mut self, prefix: &str) -> Self {
        self.failing.push(prefix.to_string());
        self
    }

    /// Pretend `program` is not installed.
    pub fn without_program(mut self, program: &str) -> Self {
        self.missing.push(program.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Cmd> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Display form of every recorded command.
    pub fn lines(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.to_string()).collect()
    }

    fn record(&self, cmd: &Cmd) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(cmd.clone());
        }
        if self.missing.contains(&cmd.program) {
            return Err(CiError::command(format!(
                "Failed to execute `{}`: program not found",
                cmd
            )));
        }
        let line = cmd.to_string();
        if self.failing.iter().any(|prefix| line.starts_with(prefix)) {
            return Err(CiError::command(format!("`{}` exited with code 1", line)));
        }
        Ok(())
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, cmd: &Cmd) -> Result<()> {
        self.record(cmd)
    }

    fn output(&self, cmd: &Cmd) -> Result<String> {
        self.record(cmd)?;
        let line = cmd.to_string();
        Ok(self
            .outputs
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default())
    }

    fn is_available(&self, program: &str) -> bool {
        !self.missing.iter().any(|p| p == program)
    }
}
