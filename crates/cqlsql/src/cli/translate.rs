//! Translate command implementation

use super::{output, read_source};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Configuration for translate command
#[derive(Debug, Clone)]
pub struct TranslateConfig {
    pub file: PathBuf,
    pub pretty: bool,
    pub output_file: Option<PathBuf>,
}

/// Print the lowered IR of a CQL file as JSON
pub fn translate(config: TranslateConfig) -> Result<()> {
    let source = read_source(&config.file)?;
    let library = crate::parse(&source)
        .with_context(|| format!("Failed to parse CQL file: {}", config.file.display()))?;
    let lowered = crate::ir::lower(&library);

    let file = config.file.display().to_string();
    for diagnostic in &lowered.diagnostics {
        eprintln!("{}", output::format_diagnostic(diagnostic, &file));
    }

    let mut json = lowered
        .library
        .to_json(config.pretty)
        .context("IR serialization failed")?;
    json.push('\n');

    output::write_output(&json, config.output_file.as_deref())
}
