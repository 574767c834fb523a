//! Function library mapping
//!
//! Calls are matched by unqualified name and argument count. Anything
//! else is passed through as written and reported by the caller.

/// Unqualified function name
pub fn local_name(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(_, local)| local)
}

/// Aggregates take their single argument as a set
pub fn is_aggregate(name: &str, arity: usize) -> bool {
    arity == 1 && matches!(name, "Count" | "Sum" | "Avg" | "Min" | "Max")
}

/// Call emitted for an unmapped function
pub fn passthrough(name: &str, args: &[String]) -> String {
    format!("{name}({})", args.join(", "))
}

fn age(at: &str, birth_date: &str, days: Option<&str>) -> String {
    match days {
        Some(days) => {
            format!("CAST((julianday({at}) - julianday({birth_date})) / {days} AS INTEGER)")
        }
        None => format!("CAST(julianday({at}) - julianday({birth_date}) AS INTEGER)"),
    }
}

/// SQL for a mapped call; `birth_date` is the current patient's column.
/// Ages without a reference date are taken at `'now'`.
pub fn lower_function(name: &str, args: &[String], birth_date: &str) -> Option<String> {
    let sql = match (name, args) {
        // === Ages ===
        ("AgeInYears", []) => age("'now'", birth_date, Some("365.25")),
        ("AgeInYearsAt", [at]) => age(at, birth_date, Some("365.25")),
        ("AgeInMonths", []) => age("'now'", birth_date, Some("30.4375")),
        ("AgeInMonthsAt", [at]) => age(at, birth_date, Some("30.4375")),
        ("AgeInDays", []) => age("'now'", birth_date, None),
        ("AgeInDaysAt", [at]) => age(at, birth_date, None),
        ("CalculateAgeInYears", [birth]) => age("'now'", birth, Some("365.25")),
        ("CalculateAgeInYearsAt", [birth, at]) => age(at, birth, Some("365.25")),

        // === Aggregates ===
        ("Count", [set]) => format!("(SELECT COUNT(*) FROM ({set}) AS agg)"),
        ("Sum", [set]) => format!("(SELECT SUM(return_value) FROM ({set}) AS agg)"),
        ("Avg", [set]) => format!("(SELECT AVG(return_value) FROM ({set}) AS agg)"),
        ("Min", [set]) => format!("(SELECT MIN(return_value) FROM ({set}) AS agg)"),
        ("Max", [set]) => format!("(SELECT MAX(return_value) FROM ({set}) AS agg)"),
        ("Min", values) if values.len() > 1 => format!("MIN({})", values.join(", ")),
        ("Max", values) if values.len() > 1 => format!("MAX({})", values.join(", ")),

        // === Strings ===
        ("Length", [s]) => format!("LENGTH({s})"),
        ("Upper", [s]) => format!("UPPER({s})"),
        ("Lower", [s]) => format!("LOWER({s})"),
        ("Substring", [s, start]) => format!("SUBSTR({s}, ({start}) + 1)"),
        ("Substring", [s, start, length]) => format!("SUBSTR({s}, ({start}) + 1, {length})"),
        ("Concatenate", parts) if !parts.is_empty() => format!("({})", parts.join(" || ")),
        ("StartsWith", [s, prefix]) => format!("{s} LIKE {prefix} || '%'"),
        ("EndsWith", [s, suffix]) => format!("{s} LIKE '%' || {suffix}"),

        // === Conversions ===
        ("ToString", [x]) => format!("CAST({x} AS TEXT)"),
        ("ToInteger", [x]) => format!("CAST({x} AS INTEGER)"),
        ("ToDecimal", [x]) => format!("CAST({x} AS REAL)"),
        ("ToDate", [x]) | ("DateFrom", [x]) => format!("date({x})"),
        ("ToDateTime", [x]) => format!("datetime({x})"),

        // === Dates ===
        ("Today", []) => "date('now')".to_string(),
        ("Now", []) => "datetime('now')".to_string(),
        ("Year", [x]) => format!("CAST(strftime('%Y', {x}) AS INTEGER)"),
        ("Month", [x]) => format!("CAST(strftime('%m', {x}) AS INTEGER)"),
        ("Day", [x]) => format!("CAST(strftime('%d', {x}) AS INTEGER)"),
        ("DaysBetween", [from, to]) => {
            format!("CAST(julianday({to}) - julianday({from}) AS INTEGER)")
        }

        // === Math ===
        ("Coalesce", values) if !values.is_empty() => format!("COALESCE({})", values.join(", ")),
        ("Abs", [x]) => format!("ABS({x})"),
        ("Round", [x]) => format!("ROUND({x})"),
        ("Round", [x, precision]) => format!("ROUND({x}, {precision})"),
        ("Floor", [x]) => format!("FLOOR({x})"),
        ("Ceiling", [x]) => format!("CEIL({x})"),
        ("Truncate", [x]) => format!("CAST({x} AS INTEGER)"),
        ("Ln", [x]) => format!("LN({x})"),
        ("Exp", [x]) => format!("EXP({x})"),
        ("Power", [x, y]) => format!("POWER({x}, {y})"),
        ("Sqrt", [x]) => format!("SQRT({x})"),
        _ => return None,
    };
    Some(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_age_at_date() {
        assert_eq!(
            lower_function("AgeInYearsAt", &args(&["'2024-01-01'"]), "p.birth_date").as_deref(),
            Some("CAST((julianday('2024-01-01') - julianday(p.birth_date)) / 365.25 AS INTEGER)")
        );
    }

    #[test]
    fn test_age_now() {
        assert_eq!(
            lower_function("AgeInYears", &[], "p.birth_date").as_deref(),
            Some("CAST((julianday('now') - julianday(p.birth_date)) / 365.25 AS INTEGER)")
        );
        assert_eq!(
            lower_function("AgeInDays", &[], "p.birth_date").as_deref(),
            Some("CAST(julianday('now') - julianday(p.birth_date) AS INTEGER)")
        );
    }

    #[rstest]
    #[case("Count", &["SELECT 1"], "(SELECT COUNT(*) FROM (SELECT 1) AS agg)")]
    #[case("Max", &["a", "b"], "MAX(a, b)")]
    #[case("Substring", &["s", "0", "2"], "SUBSTR(s, (0) + 1, 2)")]
    #[case("Today", &[], "date('now')")]
    #[case("Year", &["x"], "CAST(strftime('%Y', x) AS INTEGER)")]
    #[case("Coalesce", &["a", "b"], "COALESCE(a, b)")]
    #[case("StartsWith", &["s", "'ab'"], "s LIKE 'ab' || '%'")]
    fn test_mapped_functions(#[case] name: &str, #[case] values: &[&str], #[case] expected: &str) {
        assert_eq!(lower_function(name, &args(values), "p.birth_date").as_deref(), Some(expected));
    }

    #[test]
    fn test_unmapped_and_wrong_arity() {
        assert_eq!(lower_function("Frobnicate", &args(&["x"]), "b"), None);
        assert_eq!(lower_function("Abs", &args(&["x", "y"]), "b"), None);
        assert_eq!(passthrough("Frobnicate", &args(&["x", "1"])), "Frobnicate(x, 1)");
    }

    #[test]
    fn test_names() {
        assert_eq!(local_name("Common.AgeInYears"), "AgeInYears");
        assert!(is_aggregate("Count", 1));
        assert!(!is_aggregate("Max", 2));
    }
}
