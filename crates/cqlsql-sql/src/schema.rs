//! Fixed clinical storage schema
//!
//! Seven base tables are exposed through `<Resource>_view` CTEs. Every
//! non-patient view carries `subject_id`, and coded resources carry
//! `code`, `code_system` and `code_display`.

use cqlsql_analysis::BASE_RESOURCES;

/// A base view definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseView {
    pub resource: &'static str,
    pub columns: &'static [&'static str],
}

impl BaseView {
    pub fn name(&self) -> String {
        view_name(self.resource)
    }
}

pub const BASE_VIEWS: [BaseView; 7] = [
    BaseView {
        resource: "Patient",
        columns: &["id", "birth_date", "gender", "deceased_datetime"],
    },
    BaseView {
        resource: "Observation",
        columns: &[
            "id",
            "subject_id",
            "status",
            "code",
            "code_system",
            "code_display",
            "value_quantity",
            "value_unit",
            "value_string",
            "effective_datetime",
            "issued",
        ],
    },
    BaseView {
        resource: "Condition",
        columns: &[
            "id",
            "subject_id",
            "clinical_status",
            "verification_status",
            "code",
            "code_system",
            "code_display",
            "onset_datetime",
            "abatement_datetime",
            "recorded_date",
        ],
    },
    BaseView {
        resource: "Procedure",
        columns: &[
            "id",
            "subject_id",
            "status",
            "code",
            "code_system",
            "code_display",
            "performed_datetime",
            "performed_end",
        ],
    },
    BaseView {
        resource: "MedicationRequest",
        columns: &[
            "id",
            "subject_id",
            "status",
            "intent",
            "code",
            "code_system",
            "code_display",
            "authored_on",
        ],
    },
    BaseView {
        resource: "Encounter",
        columns: &[
            "id",
            "subject_id",
            "status",
            "class_code",
            "code",
            "code_system",
            "code_display",
            "period_start",
            "period_end",
        ],
    },
    BaseView {
        resource: "DiagnosticReport",
        columns: &[
            "id",
            "subject_id",
            "status",
            "code",
            "code_system",
            "code_display",
            "effective_datetime",
            "issued",
        ],
    },
];

pub fn view_name(resource: &str) -> String {
    format!("{resource}_view")
}

/// Reserved CTE names
pub fn is_view_name(name: &str) -> bool {
    BASE_VIEWS
        .iter()
        .any(|view| view.name().eq_ignore_ascii_case(name))
}

/// Default status condition for a resource type, without the alias
pub fn status_filter(resource: &str) -> Option<(&'static str, &'static str)> {
    let filter = match resource {
        "Observation" | "DiagnosticReport" => ("status", "IN ('final','amended','corrected')"),
        "Condition" | "AllergyIntolerance" => ("clinical_status", "= 'active'"),
        "Procedure" | "Immunization" => ("status", "= 'completed'"),
        "MedicationRequest" => ("status", "IN ('active','completed')"),
        "Encounter" => ("status", "= 'finished'"),
        _ => return None,
    };
    Some(filter)
}

/// Status condition applied to `alias`
pub fn status_condition(resource: &str, alias: &str) -> Option<String> {
    status_filter(resource).map(|(column, test)| format!("{alias}.{column} {test}"))
}

/// Relation a query reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTable {
    /// Name in the FROM clause
    pub name: String,
    /// Column holding the patient identifier
    pub patient_column: &'static str,
    /// Resource type, when reading a resource
    pub resource: Option<String>,
}

impl SourceTable {
    /// A resource type; base resources read their view
    pub fn resource(resource_type: &str) -> Self {
        let resource_type = resource_type
            .strip_suffix("_view")
            .unwrap_or(resource_type);
        let name = if BASE_RESOURCES.contains(&resource_type) {
            view_name(resource_type)
        } else {
            resource_type.to_string()
        };
        Self {
            name,
            patient_column: if resource_type == "Patient" { "id" } else { "subject_id" },
            resource: Some(resource_type.to_string()),
        }
    }

    /// An emitted definition CTE
    pub fn cte(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            patient_column: "patient_id",
            resource: None,
        }
    }

    pub fn is_patient(&self) -> bool {
        self.resource.as_deref() == Some("Patient")
    }

    pub fn status_condition(&self, alias: &str) -> Option<String> {
        self.resource
            .as_deref()
            .and_then(|resource| status_condition(resource, alias))
    }
}

/// Storage column for a clinical property name; unmapped names pass through
pub fn column_name(member: &str) -> String {
    let mapped = match member {
        "value" => "value_quantity",
        "effective" => "effective_datetime",
        "onset" => "onset_datetime",
        "abatement" => "abatement_datetime",
        "performed" => "performed_datetime",
        "deceased" => "deceased_datetime",
        "class" => "class_code",
        "type" => "type_code",
        "subject" | "patient" => "subject_id",
        "birthDate" => "birth_date",
        "clinicalStatus" => "clinical_status",
        "verificationStatus" => "verification_status",
        "authoredOn" => "authored_on",
        "recordedDate" => "recorded_date",
        other => other,
    };
    mapped.to_string()
}

/// Column for a property path below an alias (`period.start` -> `period_start`)
pub fn nested_column(path: &[&str]) -> String {
    match path {
        [single] => column_name(single),
        segments => segments
            .iter()
            .map(|s| snake_case(s))
            .collect::<Vec<_>>()
            .join("_"),
    }
}

/// `birthDate` -> `birth_date`; separators become underscores
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = false;
        } else if ch.is_ascii_alphanumeric() {
            out.push(ch);
            prev_lower = true;
        } else if !out.ends_with('_') {
            out.push('_');
            prev_lower = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("Observation", Some("o.status IN ('final','amended','corrected')"))]
    #[case("Condition", Some("o.clinical_status = 'active'"))]
    #[case("Procedure", Some("o.status = 'completed'"))]
    #[case("MedicationRequest", Some("o.status IN ('active','completed')"))]
    #[case("Encounter", Some("o.status = 'finished'"))]
    #[case("DiagnosticReport", Some("o.status IN ('final','amended','corrected')"))]
    #[case("AllergyIntolerance", Some("o.clinical_status = 'active'"))]
    #[case("Immunization", Some("o.status = 'completed'"))]
    #[case("Patient", None)]
    #[case("Coverage", None)]
    fn test_status_condition(#[case] resource: &str, #[case] expected: Option<&str>) {
        assert_eq!(status_condition(resource, "o").as_deref(), expected);
    }

    #[rstest]
    #[case("value", "value_quantity")]
    #[case("effective", "effective_datetime")]
    #[case("birthDate", "birth_date")]
    #[case("status", "status")]
    #[case("clinicalStatus", "clinical_status")]
    #[case("valueString", "valueString")]
    #[case("class_code", "class_code")]
    fn test_column_name(#[case] member: &str, #[case] expected: &str) {
        assert_eq!(column_name(member), expected);
    }

    #[test]
    fn test_nested_column() {
        assert_eq!(nested_column(&["period", "start"]), "period_start");
        assert_eq!(nested_column(&["value", "unit"]), "value_unit");
    }

    #[test]
    fn test_source_tables() {
        let patient = SourceTable::resource("Patient");
        assert_eq!(patient.name, "Patient_view");
        assert_eq!(patient.patient_column, "id");
        assert!(patient.is_patient());

        let encounter = SourceTable::resource("Encounter_view");
        assert_eq!(encounter.name, "Encounter_view");
        assert_eq!(encounter.patient_column, "subject_id");

        let immunization = SourceTable::resource("Immunization");
        assert_eq!(immunization.name, "Immunization");
        assert_eq!(
            immunization.status_condition("i").as_deref(),
            Some("i.status = 'completed'")
        );

        assert_eq!(SourceTable::cte("Adults").patient_column, "patient_id");
    }

    #[test]
    fn test_reserved_view_names() {
        assert!(is_view_name("Patient_view"));
        assert!(is_view_name("encounter_VIEW"));
        assert!(!is_view_name("Patient"));
    }
}
