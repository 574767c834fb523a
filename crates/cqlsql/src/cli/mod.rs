//! Command-line front end
//!
//! - `compile`: SQL for one library
//! - `validate`: parse, lint and reference report for many files
//! - `translate`: the lowered IR as JSON

pub mod compile;
pub mod output;
pub mod translate;
pub mod validate;

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::CompilerOptions;

/// Read a source file
pub fn read_source(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("Failed to read CQL file: {}", file.display()))
}

/// Options from an optional JSON file, defaults otherwise
pub fn load_options(config: Option<&Path>) -> Result<CompilerOptions> {
    let Some(path) = config else {
        return Ok(CompilerOptions::default());
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read options file: {}", path.display()))?;
    CompilerOptions::from_json_str(&json)
        .with_context(|| format!("Invalid options file: {}", path.display()))
}
