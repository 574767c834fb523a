//! CTE-based SQL generation
//!
//! Each definition becomes one CTE producing a `patient_id` column. The
//! statement opens with the seven base view CTEs and closes with a single
//! population count query. Two backends are provided, one walking the AST
//! and one walking the IR; both emit the same text for the same library.

pub mod ast_backend;
pub mod context;
pub mod functions;
pub mod ir_backend;
pub mod operators;
pub mod options;
pub mod render;
pub mod schema;

pub use ast_backend::AstSqlGenerator;
pub use ir_backend::IrSqlGenerator;
pub use options::{GeneratorOptions, MeasurementPeriod, Populations, ValuesetTable};

use cqlsql_analysis::{NamingViolation, Resolution};
use cqlsql_diagnostics::{CQL0202, Diagnostic};

use context::GenerationContext;
use render::{Cte, Document, ToSql};

/// Generated statement with everything found while generating it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlOutput {
    pub sql: String,
    pub resolution: Resolution,
    /// Generation warnings followed by resolution findings
    pub diagnostics: Vec<Diagnostic>,
}

impl SqlOutput {
    pub fn missing_references(&self) -> &[String] {
        &self.resolution.missing_references
    }
}

/// Generate SQL from a parsed library
pub fn generate_from_ast(
    library: &cqlsql_ast::Library,
    options: &GeneratorOptions,
    violations: &[NamingViolation],
) -> SqlOutput {
    AstSqlGenerator::new(options)
        .with_violations(violations)
        .generate(library)
}

/// Generate SQL from a lowered library
pub fn generate_from_ir(
    library: &cqlsql_ir::Library,
    options: &GeneratorOptions,
    violations: &[NamingViolation],
) -> SqlOutput {
    IrSqlGenerator::new(options)
        .with_violations(violations)
        .generate(library)
}

pub(crate) fn finish(
    mut ctx: GenerationContext<'_>,
    violations: &[NamingViolation],
    ctes: Vec<Cte>,
) -> SqlOutput {
    let options = ctx.options();
    let populations = ctx.populations();
    let configured = [
        (&options.populations.initial_population, &populations.initial_population),
        (&options.populations.denominator, &populations.denominator),
        (&options.populations.numerator, &populations.numerator),
    ];
    for (name, cte) in configured {
        if cte.is_none() {
            ctx.warn(
                CQL0202,
                format!("population \"{name}\" is not defined; it is counted as 0"),
            );
        }
    }

    let declared = ctx.declarations();
    let library = declared
        .library
        .clone()
        .unwrap_or_else(|| "Anonymous".to_string());
    let version = declared.version.clone();
    let (resolution, mut diagnostics) = ctx.finish();

    let sql = Document {
        library: &library,
        version: version.as_deref(),
        options,
        violations,
        resolution: &resolution,
        ctes: &ctes,
        populations: &populations,
    }
    .to_sql();
    log::info!(
        "generated {} definition CTEs ({} missing references)",
        ctes.len(),
        resolution.missing_references.len()
    );

    diagnostics.extend(resolution.diagnostics.iter().cloned());
    SqlOutput {
        sql,
        resolution,
        diagnostics,
    }
}
