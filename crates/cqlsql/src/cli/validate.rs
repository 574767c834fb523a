//! Validate command implementation

use super::{load_options, output, read_source};
use anyhow::Result;
use colored::Colorize;
use cqlsql_diagnostics::{CompileError, Diagnostic};
use std::path::{Path, PathBuf};

use crate::{CompilerOptions, compile};

/// Configuration for validate command
#[derive(Debug, Clone)]
pub struct ValidateConfig {
    pub files: Vec<PathBuf>,
    pub config: Option<PathBuf>,
    /// Treat warnings as errors
    pub strict: bool,
    pub verbose: bool,
}

/// Outcome for a single file
struct ValidationResult {
    file: PathBuf,
    error: Option<String>,
    diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    fn warnings(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_warning()).count()
    }

    fn passed(&self, strict: bool) -> bool {
        self.error.is_none() && !(strict && self.warnings() > 0)
    }
}

/// Validate CQL files
pub fn validate(config: ValidateConfig) -> Result<()> {
    if config.files.is_empty() {
        anyhow::bail!("No files specified for validation");
    }

    let options = load_options(config.config.as_deref())?;
    let results: Vec<ValidationResult> = config
        .files
        .iter()
        .map(|file| validate_file(file, &options, config.verbose))
        .collect::<Result<_>>()?;

    for result in &results {
        print_result(result, config.strict, config.verbose);
    }

    let errors = results.iter().filter(|r| r.error.is_some()).count();
    let warnings: usize = results.iter().map(ValidationResult::warnings).sum();
    let failed = results.iter().filter(|r| !r.passed(config.strict)).count();

    eprintln!();
    if failed == 0 {
        eprintln!(
            "{}",
            output::format_success(&format!(
                "All {} file(s) validated ({} warning(s))",
                results.len(),
                warnings
            ))
        );
        return Ok(());
    }

    if config.strict && warnings > 0 {
        eprintln!("{}", "Strict mode: treating warnings as errors".yellow());
    }
    anyhow::bail!(
        "{failed} of {} file(s) failed validation ({errors} error(s), {warnings} warning(s))",
        results.len()
    )
}

fn validate_file(file: &Path, options: &CompilerOptions, verbose: bool) -> Result<ValidationResult> {
    if verbose {
        eprintln!("Validating: {}", file.display());
    }
    let source = read_source(file)?;
    let result = match compile(&source, options) {
        Ok(compiled) => ValidationResult {
            file: file.to_path_buf(),
            error: None,
            diagnostics: compiled.diagnostics,
        },
        Err(error @ CompileError::Syntax { .. }) => ValidationResult {
            file: file.to_path_buf(),
            error: Some(error.to_string()),
            diagnostics: Vec::new(),
        },
        Err(error) => return Err(error.into()),
    };
    Ok(result)
}

fn print_result(result: &ValidationResult, strict: bool, verbose: bool) {
    let file = result.file.display().to_string();
    let mark = if result.passed(strict) {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    eprintln!("{mark} {}", file.cyan());

    if let Some(error) = &result.error {
        eprintln!("    {} {error}", "error:".red().bold());
    }
    for diagnostic in &result.diagnostics {
        if verbose || diagnostic.is_warning() {
            eprintln!("    {}", output::format_diagnostic(diagnostic, &file));
        }
    }
}
