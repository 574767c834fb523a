//! Naming-convention linter
//!
//! Declared names must be PascalCase (`^[A-Z][a-zA-Z0-9]*$`); definitions
//! must also avoid a small list of generic names. Findings are advisory and
//! never stop compilation.

use cqlsql_ast::{Expression, Library, Query};
use cqlsql_diagnostics::{CQL0120, CQL0121, CQL0122, CQL0123, Diagnostic, SourceLocation};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static PASCAL_CASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][a-zA-Z0-9]*$").expect("PascalCase pattern is valid"));

/// Definition names too generic to describe a population
pub const GENERIC_NAMES: [&str; 4] = ["result", "query", "data", "list"];

/// Parameter name exempt from the PascalCase rule
pub const RESERVED_PARAMETER: &str = "Measurement Period";

/// What kind of declaration a name belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NameCategory {
    Library,
    Definition,
    Function,
    Parameter,
    CodeSystem,
    ValueSet,
    /// Query and relationship aliases
    Variable,
}

impl fmt::Display for NameCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Library => "library",
            Self::Definition => "definition",
            Self::Function => "function",
            Self::Parameter => "parameter",
            Self::CodeSystem => "codeSystem",
            Self::ValueSet => "valueSet",
            Self::Variable => "variable",
        };
        f.write_str(s)
    }
}

/// Rule a name failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NamingRule {
    PascalCase,
    GenericName,
}

impl fmt::Display for NamingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PascalCase => f.write_str("PascalCase"),
            Self::GenericName => f.write_str("generic name"),
        }
    }
}

/// A single naming finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamingViolation {
    pub identifier: String,
    pub category: NameCategory,
    pub rule_violated: NamingRule,
    pub suggested_rewrite: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl NamingViolation {
    pub fn to_diagnostic(&self) -> Diagnostic {
        let code = match self.rule_violated {
            NamingRule::PascalCase => CQL0120,
            NamingRule::GenericName => CQL0121,
        };
        let diagnostic = Diagnostic::warning(code, self.to_string())
            .with_help(format!("rename to \"{}\"", self.suggested_rewrite));
        match self.location {
            Some(location) => diagnostic.with_location(location),
            None => diagnostic,
        }
    }
}

impl fmt::Display for NamingViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rule_violated {
            NamingRule::PascalCase => write!(
                f,
                "{} name \"{}\" is not PascalCase (suggested: {})",
                self.category, self.identifier, self.suggested_rewrite
            ),
            NamingRule::GenericName => write!(
                f,
                "{} name \"{}\" is too generic (suggested: {})",
                self.category, self.identifier, self.suggested_rewrite
            ),
        }
    }
}

/// Result of linting one library
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamingReport {
    pub violations: Vec<NamingViolation>,
    /// Document-level advisories (missing header, no definitions)
    pub advisories: Vec<Diagnostic>,
}

impl NamingReport {
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    /// Violations and advisories as diagnostics, violations first
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.violations
            .iter()
            .map(NamingViolation::to_diagnostic)
            .chain(self.advisories.iter().cloned())
            .collect()
    }
}

pub fn is_pascal_case(name: &str) -> bool {
    PASCAL_CASE.is_match(name)
}

/// Drop separators, upper-casing the character after each one and the first
pub fn to_pascal_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if upper_next {
                out.push(ch.to_ascii_uppercase());
            } else {
                out.push(ch);
            }
            upper_next = false;
        } else {
            upper_next = true;
        }
    }
    out
}

/// Lint every declared name in `library`
pub fn lint(library: &Library) -> NamingReport {
    let mut report = NamingReport::default();

    match &library.identifier {
        Some(name) => check_pascal(&mut report, name, NameCategory::Library, library.location),
        None => report.advisories.push(
            Diagnostic::info(CQL0122, "Missing library declaration")
                .with_help("start the document with `library Name version '1.0.0'`"),
        ),
    }

    for codesystem in &library.codesystems {
        check_pascal(
            &mut report,
            &codesystem.name,
            NameCategory::CodeSystem,
            Some(codesystem.location),
        );
    }
    for valueset in &library.valuesets {
        check_pascal(
            &mut report,
            &valueset.name,
            NameCategory::ValueSet,
            Some(valueset.location),
        );
    }
    for parameter in &library.parameters {
        if parameter.name != RESERVED_PARAMETER {
            check_pascal(
                &mut report,
                &parameter.name,
                NameCategory::Parameter,
                Some(parameter.location),
            );
        }
    }

    if library.defines.is_empty() {
        report.advisories.push(Diagnostic::info(
            CQL0123,
            "Consider using 'define' statements to declare populations",
        ));
    }

    for define in &library.defines {
        check_pascal(
            &mut report,
            &define.name,
            NameCategory::Definition,
            Some(define.location),
        );
        if GENERIC_NAMES.contains(&define.name.to_lowercase().as_str()) {
            report.violations.push(NamingViolation {
                identifier: define.name.clone(),
                category: NameCategory::Definition,
                rule_violated: NamingRule::GenericName,
                suggested_rewrite: format!("Qualifying{}", to_pascal_case(&define.name)),
                location: Some(define.location),
            });
        }

        let mut aliases = Vec::new();
        collect_aliases(&define.expression, &mut aliases);
        for alias in aliases {
            check_pascal(&mut report, alias, NameCategory::Variable, Some(define.location));
        }
    }

    log::debug!("naming lint found {} violations", report.violations.len());
    report
}

fn check_pascal(
    report: &mut NamingReport,
    name: &str,
    category: NameCategory,
    location: Option<SourceLocation>,
) {
    if !is_pascal_case(name) {
        report.violations.push(NamingViolation {
            identifier: name.to_string(),
            category,
            rule_violated: NamingRule::PascalCase,
            suggested_rewrite: to_pascal_case(name),
            location,
        });
    }
}

/// Query and relationship aliases in source order
fn collect_aliases<'a>(expr: &'a Expression, out: &mut Vec<&'a str>) {
    match expr {
        Expression::Query(query) => collect_query_aliases(query, out),
        Expression::Binary(b) => {
            collect_aliases(&b.left, out);
            collect_aliases(&b.right, out);
        }
        Expression::Unary(u) => collect_aliases(&u.operand, out),
        Expression::Timing(t) => {
            collect_aliases(&t.left, out);
            collect_aliases(&t.right, out);
        }
        Expression::MemberAccess(m) => collect_aliases(&m.object, out),
        Expression::FunctionCall(call) => {
            for arg in &call.args {
                collect_aliases(arg, out);
            }
        }
        Expression::Interval(interval) => {
            for bound in [&interval.start, &interval.end].into_iter().flatten() {
                collect_aliases(bound, out);
            }
        }
        Expression::ResourceReference(r) => {
            if let Some(filter) = &r.code_filter {
                collect_aliases(filter, out);
            }
        }
        Expression::Literal(_) | Expression::Identifier(_) => {}
    }
}

fn collect_query_aliases<'a>(query: &'a Query, out: &mut Vec<&'a str>) {
    collect_aliases(&query.source, out);
    if let Some(alias) = &query.alias {
        out.push(alias);
    }
    for rel in &query.relationships {
        collect_aliases(&rel.source, out);
        if let Some(alias) = &rel.alias {
            out.push(alias);
        }
        if let Some(condition) = &rel.condition {
            collect_aliases(condition, out);
        }
    }
    for clause in [&query.where_clause, &query.return_clause].into_iter().flatten() {
        collect_aliases(clause, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("InitialPopulation", true)]
    #[case("HbA1c2", true)]
    #[case("A", true)]
    #[case("initialPopulation", false)]
    #[case("Initial Population", false)]
    #[case("Initial_Population", false)]
    #[case("", false)]
    fn test_is_pascal_case(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_pascal_case(name), expected);
    }

    #[rstest]
    #[case("initial_population", "InitialPopulation")]
    #[case("Initial Population", "InitialPopulation")]
    #[case("has-diabetes dx", "HasDiabetesDx")]
    #[case("numerator", "Numerator")]
    #[case("alreadyCamel", "AlreadyCamel")]
    fn test_to_pascal_case(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(to_pascal_case(name), expected);
    }
}
