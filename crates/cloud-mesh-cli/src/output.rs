//! Terminal and JSON output helpers.

use colored::Colorize;
use serde::Serialize;

use crate::OutputFormat;

/// Print `value` as pretty JSON. Text output is rendered by each command.
pub fn print<T: Serialize>(value: &T, format: OutputFormat, quiet: bool) {
    if quiet || !matches!(format, OutputFormat::Json) {
        return;
    }
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("{}: failed to serialize result: {}", "Error".red().bold(), e),
    }
}

pub fn success(message: &str, format: OutputFormat, quiet: bool) {
    if quiet || matches!(format, OutputFormat::Json) {
        return;
    }
    println!("{} {}", "✓".green().bold(), message);
}

pub fn info(message: &str, format: OutputFormat, quiet: bool) {
    if quiet || matches!(format, OutputFormat::Json) {
        return;
    }
    println!("{} {}", "→".blue(), message);
}

pub fn warning(message: &str, format: OutputFormat, quiet: bool) {
    if quiet || matches!(format, OutputFormat::Json) {
        return;
    }
    println!("{} {}", "!".yellow().bold(), message);
}

/// Render a library error with its code and recovery suggestion on stderr.
pub fn cloud_error(err: &cloud_mesh::CloudError) {
    eprintln!("{}: {}", "Error".red().bold(), err);
    eprintln!("  {}: {}", "Code".cyan(), err.code());
    eprintln!("  {}: {}", "Suggestion".green(), err.recovery_suggestion());
    if let Some(path) = err.path() {
        eprintln!("  {}: {}", "File".yellow(), path.display());
    }
}
