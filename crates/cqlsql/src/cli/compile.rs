//! Compile command implementation

use super::{load_options, output, read_source};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;

use crate::{Backend, MeasurementPeriod, compile as compile_source};

/// Configuration for compile command
#[derive(Debug, Clone)]
pub struct CompileConfig {
    pub file: PathBuf,
    pub config: Option<PathBuf>,
    pub backend: Option<Backend>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub output_file: Option<PathBuf>,
    pub verbose: bool,
}

/// Compile a CQL file to SQL
pub fn compile(config: CompileConfig) -> Result<()> {
    let mut options = load_options(config.config.as_deref())?;
    if let Some(backend) = config.backend {
        options.backend = backend;
    }
    let period = options.generator.measurement_period;
    options.generator.measurement_period = MeasurementPeriod {
        start: config.period_start.unwrap_or(period.start),
        end: config.period_end.unwrap_or(period.end),
    };

    let source = read_source(&config.file)?;
    let compiled = compile_source(&source, &options)
        .with_context(|| format!("Failed to compile CQL file: {}", config.file.display()))?;

    let file = config.file.display().to_string();
    for diagnostic in &compiled.diagnostics {
        if config.verbose || diagnostic.is_warning() || diagnostic.is_error() {
            eprintln!("{}", output::format_diagnostic(diagnostic, &file));
        }
    }
    if !compiled.missing_references.is_empty() {
        eprintln!(
            "{}",
            output::format_warning(&format!(
                "{} missing reference(s); placeholder CTEs were emitted",
                compiled.missing_references.len()
            ))
        );
    }

    output::write_output(&compiled.sql, config.output_file.as_deref())
}
