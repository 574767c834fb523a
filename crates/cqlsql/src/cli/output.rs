//! Output formatting utilities

use anyhow::{Context, Result};
use colored::Colorize;
use cqlsql_diagnostics::{Diagnostic, Severity};
use std::fs;
use std::io::IsTerminal;
use std::path::Path;

/// Set up color output based on user preference (`auto`, `always`, `never`)
pub fn setup_colors(mode: &str) {
    match mode.to_lowercase().as_str() {
        "always" => colored::control::set_override(true),
        "never" => colored::control::set_override(false),
        _ => colored::control::set_override(std::io::stderr().is_terminal()),
    }
}

pub fn format_error(error: &anyhow::Error) -> String {
    format!("{} {:#}", "Error:".red().bold(), error)
}

pub fn format_warning(warning: &str) -> String {
    format!("{} {}", "Warning:".yellow().bold(), warning)
}

pub fn format_success(message: &str) -> String {
    format!("{} {}", "Success:".green().bold(), message)
}

/// `file:line:col`
pub fn format_location(file: &str, line: usize, column: usize) -> String {
    format!("{}:{}:{}", file.cyan(), line, column)
}

/// One diagnostic as a report line, with its help text indented below
pub fn format_diagnostic(diagnostic: &Diagnostic, file: &str) -> String {
    let label = match diagnostic.severity {
        Severity::Error => "error".red().bold(),
        Severity::Warning => "warning".yellow().bold(),
        Severity::Info => "info".blue().bold(),
    };
    let mut line = match diagnostic.location {
        Some(location) => format!(
            "{} {label}[{}]: {}",
            format_location(file, location.line, location.column),
            diagnostic.code,
            diagnostic.message
        ),
        None => format!(
            "{} {label}[{}]: {}",
            file.cyan(),
            diagnostic.code,
            diagnostic.message
        ),
    };
    if let Some(help) = &diagnostic.help {
        line.push_str(&format!("\n    {} {help}", "help:".dimmed()));
    }
    line
}

/// Write output to a file or stdout
pub fn write_output(content: &str, output_file: Option<&Path>) -> Result<()> {
    match output_file {
        Some(path) => {
            fs::write(path, content)
                .with_context(|| format!("Failed to write output file: {}", path.display()))?;
            eprintln!(
                "{}",
                format_success(&format!("Output written to {}", path.display()))
            );
        }
        None => print!("{content}"),
    }
    Ok(())
}
