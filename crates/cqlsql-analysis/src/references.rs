//! Reference classification
//!
//! Code generators register every identifier they read. A name is local
//! when it matches an already emitted definition or CTE, or a declared
//! parameter or terminology entry; built-in when it names a base resource
//! view or the measurement period; missing otherwise. Classification uses
//! the scope as it stands at the time of the read, so a reference to a
//! later definition is missing.

use cqlsql_diagnostics::{CQL0100, CQL0101, CQL0103, Diagnostic, SourceLocation};
use indexmap::{IndexMap, IndexSet};

/// The seven base resource types backed by a view
pub const BASE_RESOURCES: [&str; 7] = [
    "Patient",
    "Observation",
    "Condition",
    "Procedure",
    "MedicationRequest",
    "Encounter",
    "DiagnosticReport",
];

/// Both spellings of the measurement period parameter
pub const MEASUREMENT_PERIOD_NAMES: [&str; 2] = ["Measurement Period", "MeasurementPeriod"];

/// Names visible to the resolver at the time of a read
pub trait ReferenceScope {
    /// A definition with this declared name has been emitted
    fn is_defined(&self, name: &str) -> bool;

    /// A CTE with this whitespace-stripped name has been emitted
    fn has_cte(&self, stripped: &str) -> bool;

    /// A parameter, valueset, codesystem or code with this name is declared
    fn is_declared(&self, name: &str) -> bool;

    /// A definition with this name appears later in the document
    fn is_declared_later(&self, _name: &str) -> bool {
        false
    }
}

/// How a referenced name resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Local,
    Builtin,
    Missing,
}

/// Remove every whitespace character
pub fn strip_whitespace(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn is_measurement_period(name: &str) -> bool {
    let stripped = strip_whitespace(name);
    MEASUREMENT_PERIOD_NAMES
        .iter()
        .any(|builtin| strip_whitespace(builtin) == stripped)
}

/// Base resource name, `<Resource>_view`, or the measurement period
pub fn is_builtin(name: &str) -> bool {
    let stripped = strip_whitespace(name);
    let resource = stripped.strip_suffix("_view").unwrap_or(&stripped);
    BASE_RESOURCES.contains(&resource) || is_measurement_period(name)
}

/// Classify `name` against the fixed built-in set and `scope`
pub fn classify(name: &str, scope: &impl ReferenceScope) -> ReferenceKind {
    let stripped = strip_whitespace(name);
    if is_builtin(name) {
        ReferenceKind::Builtin
    } else if scope.is_defined(name) || scope.has_cte(&stripped) || scope.is_declared(name) {
        ReferenceKind::Local
    } else {
        ReferenceKind::Missing
    }
}

/// Tracks referenced and missing names during one generation run
#[derive(Debug, Clone, Default)]
pub struct ReferenceResolver {
    referenced: IndexSet<String>,
    /// Missing names with the location of their first read
    missing: IndexMap<String, Option<SourceLocation>>,
    /// Missing names that were declared later at the time of the read
    forward: IndexSet<String>,
}

impl ReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a read of `name` and classify it
    pub fn register(
        &mut self,
        name: &str,
        location: Option<SourceLocation>,
        scope: &impl ReferenceScope,
    ) -> ReferenceKind {
        self.referenced.insert(name.to_string());
        let kind = classify(name, scope);
        if kind == ReferenceKind::Missing && !self.missing.contains_key(name) {
            log::warn!("missing reference \"{name}\"");
            self.missing.insert(name.to_string(), location);
            if scope.is_declared_later(name) {
                self.forward.insert(name.to_string());
            }
        }
        kind
    }

    pub fn referenced_identifiers(&self) -> &IndexSet<String> {
        &self.referenced
    }

    pub fn is_missing(&self, name: &str) -> bool {
        self.missing.contains_key(name)
    }

    pub fn has_missing(&self) -> bool {
        !self.missing.is_empty()
    }

    /// Final resolution pass over everything read, in first-read order
    pub fn finish(&self, unloaded_includes: &[String]) -> Resolution {
        let missing_references: Vec<String> = self
            .referenced
            .iter()
            .filter(|name| self.missing.contains_key(name.as_str()))
            .cloned()
            .collect();

        let mut diagnostics = Vec::new();
        for name in &missing_references {
            let location = self.missing.get(name).copied().flatten();
            let diagnostic = if self.forward.contains(name) {
                Diagnostic::warning(
                    CQL0101,
                    format!("\"{name}\" is referenced before its definition"),
                )
                .with_help("move the definition above its first use")
            } else {
                Diagnostic::warning(CQL0100, format!("Missing reference \"{name}\""))
                    .with_help(CQL0100.info().help.unwrap_or_default())
            };
            diagnostics.push(match location {
                Some(location) => diagnostic.with_location(location),
                None => diagnostic,
            });
        }
        for include in unloaded_includes {
            diagnostics.push(Diagnostic::info(
                CQL0103,
                format!("Included library \"{include}\" is not loaded; its definitions are unavailable"),
            ));
        }

        Resolution {
            missing_references,
            unloaded_includes: unloaded_includes.to_vec(),
            diagnostics,
        }
    }
}

/// Outcome of [`ReferenceResolver::finish`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub missing_references: Vec<String>,
    pub unloaded_includes: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    /// A disclaimer is needed when anything could not be resolved
    pub fn needs_disclaimer(&self) -> bool {
        !self.missing_references.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[derive(Default)]
    struct Scope {
        defined: Vec<&'static str>,
        later: Vec<&'static str>,
        declared: Vec<&'static str>,
    }

    impl ReferenceScope for Scope {
        fn is_defined(&self, name: &str) -> bool {
            self.defined.iter().any(|d| *d == name)
        }

        fn has_cte(&self, stripped: &str) -> bool {
            self.defined.iter().any(|d| strip_whitespace(d) == stripped)
        }

        fn is_declared(&self, name: &str) -> bool {
            self.declared.iter().any(|d| *d == name)
        }

        fn is_declared_later(&self, name: &str) -> bool {
            self.later.iter().any(|d| *d == name)
        }
    }

    #[rstest]
    #[case("Patient", true)]
    #[case("Encounter_view", true)]
    #[case("Measurement Period", true)]
    #[case("MeasurementPeriod", true)]
    #[case("AllergyIntolerance", false)]
    #[case("Adults", false)]
    fn test_is_builtin(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_builtin(name), expected);
    }

    #[test]
    fn test_classify_local_by_cte_name() {
        let scope = Scope {
            defined: vec!["Initial Population"],
            ..Default::default()
        };
        assert_eq!(classify("Initial Population", &scope), ReferenceKind::Local);
        assert_eq!(classify("InitialPopulation", &scope), ReferenceKind::Local);
        assert_eq!(classify("Other", &scope), ReferenceKind::Missing);
    }

    #[test]
    fn test_declared_names_are_local() {
        let scope = Scope {
            declared: vec!["Diabetes"],
            ..Default::default()
        };
        assert_eq!(classify("Diabetes", &scope), ReferenceKind::Local);
    }

    #[test]
    fn test_missing_reported_once_in_read_order() {
        let scope = Scope::default();
        let mut resolver = ReferenceResolver::new();
        resolver.register("B", None, &scope);
        resolver.register("Patient", None, &scope);
        resolver.register("A", Some(SourceLocation::new(3, 1)), &scope);
        resolver.register("B", None, &scope);

        let resolution = resolver.finish(&[]);
        assert_eq!(resolution.missing_references, vec!["B", "A"]);
        assert_eq!(resolution.diagnostics.len(), 2);
        assert_eq!(resolution.diagnostics[1].location, Some(SourceLocation::new(3, 1)));
        assert!(resolution.needs_disclaimer());
        assert_eq!(resolver.referenced_identifiers().len(), 3);
    }

    #[test]
    fn test_forward_reference_diagnostic() {
        let scope = Scope {
            later: vec!["Later"],
            ..Default::default()
        };
        let mut resolver = ReferenceResolver::new();
        assert_eq!(resolver.register("Later", None, &scope), ReferenceKind::Missing);
        let resolution = resolver.finish(&[]);
        assert_eq!(resolution.diagnostics[0].code, CQL0101);
    }

    #[test]
    fn test_unloaded_includes_are_reported() {
        let resolver = ReferenceResolver::new();
        let resolution = resolver.finish(&["Common".to_string()]);
        assert!(!resolution.needs_disclaimer());
        assert_eq!(resolution.unloaded_includes, vec!["Common"]);
        assert_eq!(resolution.diagnostics[0].code, CQL0103);
    }
}
