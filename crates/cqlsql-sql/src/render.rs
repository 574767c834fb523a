//! SQL text rendering shared by both backends

use cqlsql_analysis::{NamingViolation, Resolution};
use cqlsql_ast::LiteralType;

use crate::context::PopulationRefs;
use crate::options::{GeneratorOptions, ValuesetTable};
use crate::schema::BASE_VIEWS;

const INDENT: &str = "  ";

/// Empty patient set
pub const EMPTY_SET: &str = "SELECT NULL AS patient_id WHERE 1=0";

/// Types that render to SQL text
pub trait ToSql {
    fn to_sql(&self) -> String;
}

/// Single-quoted SQL string literal
pub fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Inline marker for a shape that cannot be generated
pub fn unsupported(what: &str) -> String {
    format!("'<unsupported: {what}>'")
}

pub fn missing_comment(name: &str) -> String {
    format!("/* Missing reference: \"{name}\" */")
}

/// Boolean stand-in for a missing reference
pub fn missing_condition(name: &str) -> String {
    format!("FALSE {}", missing_comment(name))
}

/// Empty set stand-in for a missing reference
pub fn missing_set(name: &str) -> String {
    format!("{EMPTY_SET} {}", missing_comment(name))
}

/// CTE identifier for a definition name
pub fn sanitize_cte_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Bind parameter placeholder for a parameter without a literal default
pub fn bind_parameter(name: &str) -> String {
    format!(":{}", sanitize_cte_name(name).trim_start_matches('_'))
}

/// Map a local type name back to a literal type
pub fn literal_type(name: &str) -> Option<LiteralType> {
    let value_type = match name {
        "Null" => LiteralType::Null,
        "Boolean" => LiteralType::Boolean,
        "Integer" => LiteralType::Integer,
        "Decimal" => LiteralType::Decimal,
        "String" => LiteralType::String,
        "Date" => LiteralType::Date,
        "DateTime" => LiteralType::DateTime,
        "Time" => LiteralType::Time,
        "Quantity" => LiteralType::Quantity,
        _ => return None,
    };
    Some(value_type)
}

pub fn literal_sql(value_type: LiteralType, value: &str) -> String {
    match value_type {
        LiteralType::Null => "NULL".to_string(),
        LiteralType::Boolean => {
            if value.eq_ignore_ascii_case("true") {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        LiteralType::Integer | LiteralType::Decimal | LiteralType::Quantity => value.to_string(),
        LiteralType::String | LiteralType::Date | LiteralType::DateTime => quote(value),
        LiteralType::Time => quote(value.trim_start_matches('T')),
    }
}

/// `http://`, `https://` and `urn:` text is treated as a value set URL
pub fn is_canonical_url(text: &str) -> bool {
    text.starts_with("http://") || text.starts_with("https://") || text.starts_with("urn:")
}

/// Membership test against the pre-expanded value set table
pub fn valueset_exists(table: &ValuesetTable, url: &str, code: &str, system: &str) -> String {
    format!(
        "EXISTS (SELECT 1 FROM {name} vs WHERE vs.{url_col} = {url} AND vs.{code_col} = {code} AND vs.{system_col} = {system})",
        name = table.name,
        url_col = table.url_column,
        url = quote(url),
        code_col = table.code_column,
        system_col = table.system_column,
    )
}

/// Display text match used for free-text code filters
pub fn display_match(alias: &str, text: &str) -> String {
    format!("{alias}.code_display LIKE '%{}%'", text.replace('\'', "''"))
}

// ============================================================================
// SELECT statements
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectBuilder {
    pub distinct: bool,
    pub columns: Vec<String>,
    pub from: String,
    pub joins: Vec<String>,
    pub conditions: Vec<String>,
}

impl SelectBuilder {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            ..Self::default()
        }
    }

    /// `SELECT p.id AS patient_id FROM Patient_view p WHERE {condition}`
    pub fn patient_wrapper(condition: String) -> Self {
        Self {
            columns: vec!["p.id AS patient_id".to_string()],
            conditions: vec![condition],
            ..Self::new("Patient_view p")
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    fn select_clause(&self) -> String {
        let keyword = if self.distinct { "SELECT DISTINCT" } else { "SELECT" };
        format!("{keyword} {}", self.columns.join(", "))
    }

    /// Single-line form used inside expressions
    pub fn inline(&self) -> String {
        let mut sql = format!("{} FROM {}", self.select_clause(), self.from);
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
        sql
    }

    /// Single-line form projecting only the patient key
    ///
    /// `IN` operands and set operations compare one column, so the extra
    /// Patient columns and `return_value` are dropped.
    pub fn inline_ids(&self) -> String {
        let ids = Self {
            columns: self.columns.iter().take(1).cloned().collect(),
            ..self.clone()
        };
        ids.inline()
    }

    /// Multi-line form used as a CTE body
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.select_clause(), format!("FROM {}", self.from)];
        lines.extend(self.joins.iter().cloned());
        for (i, condition) in self.conditions.iter().enumerate() {
            if i == 0 {
                lines.push(format!("WHERE {condition}"));
            } else {
                lines.push(format!("{INDENT}AND {condition}"));
            }
        }
        lines
    }
}

impl ToSql for SelectBuilder {
    fn to_sql(&self) -> String {
        self.inline()
    }
}

// ============================================================================
// CTEs
// ============================================================================

/// Body of a definition CTE
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CteBody {
    Select(SelectBuilder),
    /// Straight read of another relation's patients
    Passthrough { relation: String, patient_column: String },
    /// A definition whose source is unresolved
    Placeholder { missing: String },
}

impl CteBody {
    pub fn passthrough(relation: &str, patient_column: &str) -> Self {
        Self::Passthrough {
            relation: relation.to_string(),
            patient_column: patient_column.to_string(),
        }
    }

    fn lines(&self) -> Vec<String> {
        match self {
            Self::Select(select) => select.lines(),
            Self::Passthrough {
                relation,
                patient_column,
            } => vec![patient_select(relation, patient_column)],
            Self::Placeholder { missing } => vec![
                format!("-- Placeholder: missing reference \"{missing}\""),
                EMPTY_SET.to_string(),
            ],
        }
    }
}

/// `SELECT patient_id FROM X`, aliasing the patient column when needed
pub fn patient_select(relation: &str, patient_column: &str) -> String {
    if patient_column == "patient_id" {
        format!("SELECT patient_id FROM {relation}")
    } else {
        format!("SELECT {patient_column} AS patient_id FROM {relation}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cte {
    pub name: String,
    pub body: Vec<String>,
}

impl Cte {
    pub fn new(name: impl Into<String>, body: &CteBody) -> Self {
        Self {
            name: name.into(),
            body: body.lines(),
        }
    }
}

impl ToSql for Cte {
    fn to_sql(&self) -> String {
        let mut sql = format!("{} AS (\n", self.name);
        for line in &self.body {
            sql.push_str(INDENT);
            sql.push_str(line);
            sql.push('\n');
        }
        sql.push(')');
        sql
    }
}

/// CTEs over the seven base tables
pub fn base_view_ctes() -> Vec<Cte> {
    BASE_VIEWS
        .iter()
        .map(|view| Cte {
            name: view.name(),
            body: vec![
                format!("SELECT {}", view.columns.join(", ")),
                format!("FROM {}", view.resource),
            ],
        })
        .collect()
}

// ============================================================================
// Document
// ============================================================================

/// Everything the closing layout needs
#[derive(Debug)]
pub struct Document<'a> {
    pub library: &'a str,
    pub version: Option<&'a str>,
    pub options: &'a GeneratorOptions,
    pub violations: &'a [NamingViolation],
    pub resolution: &'a Resolution,
    pub ctes: &'a [Cte],
    pub populations: &'a PopulationRefs,
}

impl Document<'_> {
    fn header(&self) -> Vec<String> {
        let period = &self.options.measurement_period;
        let mut lines = vec!["-- Generated by cqlsql".to_string()];
        lines.push(match self.version {
            Some(version) => format!("-- Library: {} version '{version}'", self.library),
            None => format!("-- Library: {}", self.library),
        });
        lines.push(format!(
            "-- Measurement Period: {} to {}",
            period.start.format("%Y-%m-%d"),
            period.end.format("%Y-%m-%d")
        ));

        if !self.violations.is_empty() {
            lines.push("--".to_string());
            lines.push("-- Naming convention violations:".to_string());
            for violation in self.violations {
                lines.push(format!("--   {violation}"));
            }
        }

        let resolution = self.resolution;
        if resolution.needs_disclaimer() {
            lines.push("--".to_string());
            lines.push(
                "-- DISCLAIMER: some references could not be resolved. Their definitions"
                    .to_string(),
            );
            lines.push("-- are placeholders that return no rows, so results are incomplete.".to_string());
            lines.push("-- Missing references:".to_string());
            for name in &resolution.missing_references {
                lines.push(format!("--   - \"{name}\""));
            }
            if !resolution.unloaded_includes.is_empty() {
                lines.push("-- Included libraries not loaded:".to_string());
                for include in &resolution.unloaded_includes {
                    lines.push(format!("--   - {include}"));
                }
            }
        }
        lines
    }

    fn final_select(&self) -> String {
        let count = |cte: &Option<String>| match cte {
            Some(name) => format!("(SELECT COUNT(DISTINCT patient_id) FROM {name})"),
            None => "0".to_string(),
        };
        let populations = self.populations;
        let denominator = count(&populations.denominator);
        let numerator = count(&populations.numerator);
        let rate = match populations.denominator {
            Some(_) => format!(
                "CASE WHEN {denominator} = 0 THEN NULL ELSE {numerator} * 100.0 / {denominator} END"
            ),
            None => "NULL".to_string(),
        };
        format!(
            "SELECT\n{INDENT}{} AS initial_population_count,\n{INDENT}{denominator} AS denominator_count,\n{INDENT}{numerator} AS numerator_count,\n{INDENT}{rate} AS performance_rate;\n",
            count(&populations.initial_population)
        )
    }
}

impl ToSql for Document<'_> {
    fn to_sql(&self) -> String {
        let mut sql = self.header().join("\n");
        sql.push_str("\n\nWITH\n");
        let ctes: Vec<String> = base_view_ctes()
            .iter()
            .chain(self.ctes.iter())
            .map(ToSql::to_sql)
            .collect();
        sql.push_str(&ctes.join(",\n"));
        sql.push_str("\n\n");
        sql.push_str(&self.final_select());
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("Initial Population", "InitialPopulation")]
    #[case("Age >= 18", "Age__18")]
    #[case("2024 Visits", "_2024Visits")]
    #[case("Has-Visit", "Has_Visit")]
    fn test_sanitize_cte_name(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(sanitize_cte_name(name), expected);
    }

    #[rstest]
    #[case(LiteralType::Null, "null", "NULL")]
    #[case(LiteralType::Boolean, "true", "TRUE")]
    #[case(LiteralType::Integer, "18", "18")]
    #[case(LiteralType::String, "it's", "'it''s'")]
    #[case(LiteralType::Date, "2024-01-01", "'2024-01-01'")]
    #[case(LiteralType::Time, "T08:30:00", "'08:30:00'")]
    fn test_literal_sql(#[case] value_type: LiteralType, #[case] value: &str, #[case] expected: &str) {
        assert_eq!(literal_sql(value_type, value), expected);
    }

    #[test]
    fn test_select_forms() {
        let mut select = SelectBuilder::new("Encounter_view e")
            .distinct()
            .column("e.subject_id AS patient_id");
        select.conditions.push("e.status = 'finished'".to_string());
        select.conditions.push("e.class_code = 'AMB'".to_string());
        assert_eq!(
            select.inline(),
            "SELECT DISTINCT e.subject_id AS patient_id FROM Encounter_view e WHERE e.status = 'finished' AND e.class_code = 'AMB'"
        );
        assert_eq!(
            select.lines(),
            vec![
                "SELECT DISTINCT e.subject_id AS patient_id",
                "FROM Encounter_view e",
                "WHERE e.status = 'finished'",
                "  AND e.class_code = 'AMB'",
            ]
        );
    }

    #[test]
    fn test_inline_ids_keeps_patient_key() {
        let mut select = SelectBuilder::new("Patient_view P")
            .distinct()
            .column("P.id AS patient_id")
            .column("P.birth_date")
            .column("P.gender");
        select.conditions.push("P.gender = 'female'".to_string());
        assert_eq!(
            select.inline_ids(),
            "SELECT DISTINCT P.id AS patient_id FROM Patient_view P WHERE P.gender = 'female'"
        );
        assert_eq!(select.columns.len(), 3);
    }

    #[test]
    fn test_placeholder_cte() {
        let cte = Cte::new(
            "External",
            &CteBody::Placeholder {
                missing: "Other".to_string(),
            },
        );
        assert_eq!(
            cte.to_sql(),
            "External AS (\n  -- Placeholder: missing reference \"Other\"\n  SELECT NULL AS patient_id WHERE 1=0\n)"
        );
    }

    #[test]
    fn test_valueset_exists() {
        let sql = valueset_exists(&ValuesetTable::default(), "urn:oid:1.2", "c.code", "c.code_system");
        assert_eq!(
            sql,
            "EXISTS (SELECT 1 FROM valueset_membership vs WHERE vs.valueset_url = 'urn:oid:1.2' AND vs.code = c.code AND vs.code_system = c.code_system)"
        );
    }

    #[test]
    fn test_bind_parameter() {
        assert_eq!(bind_parameter("Lookback Days"), ":LookbackDays");
    }
}
