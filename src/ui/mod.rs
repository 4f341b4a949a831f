//! User interface module - interaction (prompts) and formatting.
//!
//! Separates concerns:
//! - `formatter` - Pure formatting functions
//! - This module - Interactive prompts and user input handling

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Mutex;

use crate::error::Result;

pub mod formatter;

// Re-export formatter functions for convenience
pub use formatter::{
    display_command, display_error, display_info, display_status, display_success,
    display_version_bump, display_warning,
};

/// Source of user answers.
///
/// Workflows ask through this trait so tests can script the answers.
pub trait Prompt: Send + Sync {
    /// Ask a yes/no question. Only "y" or "yes" confirm.
    fn confirm(&self, prompt: &str) -> Result<bool>;

    /// Ask for a line of free text, returned trimmed.
    fn input(&self, prompt: &str) -> Result<String>;
}

/// Reads answers from the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

fn read_line() -> Result<String> {
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

impl Prompt for TerminalPrompt {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        print!("\n{} (y/n): ", prompt);
        io::stdout().flush()?;
        Ok(is_yes(&read_line()?))
    }

    fn input(&self, prompt: &str) -> Result<String> {
        print!("{}: ", prompt);
        io::stdout().flush()?;
        read_line()
    }
}

/// Answers every confirmation with yes (`--yes`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Prompt for AssumeYes {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }

    fn input(&self, prompt: &str) -> Result<String> {
        TerminalPrompt.input(prompt)
    }
}

/// Replays prepared answers, for tests.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<String>>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedPrompt {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
        }
    }

    fn next(&self) -> String {
        self.answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front())
            .unwrap_or_default()
    }
}

impl Prompt for ScriptedPrompt {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(is_yes(&self.next()))
    }

    fn input(&self, _prompt: &str) -> Result<String> {
        Ok(self.next().trim().to_string())
    }
}

fn is_yes(response: &str) -> bool {
    let response = response.trim().to_lowercase();
    response == "y" || response == "yes"
}
