//! Compile CQL measure libraries into CTE-based SQL
//!
//! The pipeline is parse, lint, then generate. Generation runs either
//! directly over the AST or over the lowered IR; both backends produce
//! the same statement.
//!
//! # Example
//!
//! ```
//! use cqlsql::{CompilerOptions, compile};
//!
//! let cql = r#"
//! library Example version '1.0.0'
//! define "InitialPopulation": AgeInYears() >= 18
//! "#;
//!
//! let output = compile(cql, &CompilerOptions::default()).unwrap();
//! assert!(output.sql.contains("InitialPopulation AS ("));
//! ```

pub use cqlsql_analysis as analysis;
pub use cqlsql_ast as ast;
pub use cqlsql_diagnostics as diagnostics;
pub use cqlsql_ir as ir;
pub use cqlsql_parser as parser;
pub use cqlsql_sql as sql;

pub use cqlsql_analysis::NamingViolation;
pub use cqlsql_diagnostics::{CompileError, Diagnostic, Result};
pub use cqlsql_parser::parse;
pub use cqlsql_sql::{GeneratorOptions, MeasurementPeriod, Populations, ValuesetTable};

use cqlsql_diagnostics::CQL0402;
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
pub mod cli;

/// Which tree the SQL is generated from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Ast,
    Ir,
}

/// Options for one compilation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerOptions {
    pub backend: Backend,
    #[serde(flatten)]
    pub generator: GeneratorOptions,
}

impl CompilerOptions {
    /// Parse options from JSON; omitted fields keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| CompileError::config(format!("invalid options: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let period = &self.generator.measurement_period;
        if !period.is_valid() {
            return Err(CompileError::Config {
                code: CQL0402,
                message: format!(
                    "measurement period ends ({}) before it starts ({})",
                    period.end, period.start
                ),
            });
        }
        Ok(())
    }
}

/// Everything produced by [`compile`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutput {
    pub sql: String,
    /// One rendered line per diagnostic, in order
    pub log: Vec<String>,
    pub naming_violations: Vec<NamingViolation>,
    pub missing_references: Vec<String>,
    /// Naming findings, then lowering warnings, then generation findings
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutput {
    pub fn has_warnings(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_warning)
    }
}

/// Compile one source document
///
/// Only malformed syntax and invalid options fail; every other problem
/// is reported in [`CompileOutput::diagnostics`].
pub fn compile(source: &str, options: &CompilerOptions) -> Result<CompileOutput> {
    options.validate()?;
    let library = parse(source)?;
    let report = cqlsql_analysis::lint(&library);
    let mut diagnostics = report.diagnostics();

    let generated = match options.backend {
        Backend::Ast => {
            cqlsql_sql::generate_from_ast(&library, &options.generator, &report.violations)
        }
        Backend::Ir => {
            let lowered = cqlsql_ir::lower(&library);
            diagnostics.extend(lowered.diagnostics);
            cqlsql_sql::generate_from_ir(&lowered.library, &options.generator, &report.violations)
        }
    };
    log::debug!(
        "compiled {} definitions with the {:?} backend",
        library.defines.len(),
        options.backend
    );

    diagnostics.extend(generated.diagnostics);
    Ok(CompileOutput {
        sql: generated.sql,
        log: diagnostics.iter().map(ToString::to_string).collect(),
        naming_violations: report.violations,
        missing_references: generated.resolution.missing_references,
        diagnostics,
    })
}
