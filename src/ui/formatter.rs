//! Pure formatting functions for UI output.
//!
//! Everything the user reads goes through here; diagnostics go to `tracing`.

use console::style;

use crate::process::Cmd;
use crate::warning::CiWarning;

/// Format and print an error message in red.
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("ERROR:").red(), message);
}

/// Format and print a success message with green checkmark.
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

/// Format and print a status message with yellow arrow.
pub fn display_status(message: &str) {
    println!("{} {}", style("→").yellow(), message);
}

/// Print an informational line, e.g. the changelog link about to be used.
pub fn display_info(message: &str) {
    println!("{} {}", style("INFO:").cyan(), message);
}

/// Display a non-fatal warning.
pub fn display_warning(warning: &CiWarning) {
    eprintln!("{} {}", style("⚠ WARNING:").yellow(), warning);
}

/// Echo a command before it runs.
pub fn display_command(cmd: &Cmd) {
    println!("\n{} {}", style("run:").bold(), style(cmd).cyan());
}

/// Show the version transition of a release.
pub fn display_version_bump(previous: &str, next: &str) {
    println!("\n{}", style("Release:").bold());
    println!("  From: {}", style(previous).red());
    println!("  To:   {}", style(next).green());
}
