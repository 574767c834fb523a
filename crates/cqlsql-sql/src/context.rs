//! Generation context
//!
//! One context lives for one compilation. State only grows while the
//! definitions are walked in order: emitted CTEs, registered references
//! and diagnostics are appended, never removed.

use cqlsql_analysis::{
    ReferenceKind, ReferenceResolver, ReferenceScope, Resolution, is_builtin,
    is_measurement_period, strip_whitespace,
};
use cqlsql_diagnostics::{CQL0109, CQL0200, CQL0201, Diagnostic, ErrorCode, SourceLocation};
use indexmap::{IndexMap, IndexSet};

use crate::functions;
use crate::operators::{self, Bounds};
use crate::options::GeneratorOptions;
use crate::render::{
    CteBody, SelectBuilder, display_match, is_canonical_url, missing_condition, missing_set,
    patient_select, quote, sanitize_cte_name, unsupported, valueset_exists,
};
use crate::schema::{SourceTable, is_view_name};

/// A declared code with its code system resolved to a URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBinding {
    pub code: String,
    pub system: String,
}

/// Declared `include`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeBinding {
    pub local_name: String,
    pub library: String,
}

impl IncludeBinding {
    /// Listing used in the disclaimer block
    pub fn describe(&self) -> String {
        if self.local_name == self.library {
            self.library.clone()
        } else {
            format!("{} (called {})", self.library, self.local_name)
        }
    }
}

/// Names declared by the document, collected before generation starts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    pub library: Option<String>,
    pub version: Option<String>,
    pub valuesets: IndexMap<String, String>,
    pub codesystems: IndexMap<String, String>,
    pub codes: IndexMap<String, CodeBinding>,
    pub parameters: IndexSet<String>,
    /// Every definition name, in document order
    pub defines: IndexSet<String>,
    pub includes: Vec<IncludeBinding>,
}

impl Declarations {
    /// Resolve a code's declaring code system name to its URI
    pub fn bind_code(&mut self, name: &str, code: &str, system: &str) {
        let system = self
            .codesystems
            .get(system)
            .cloned()
            .unwrap_or_else(|| system.to_string());
        self.codes.insert(
            name.to_string(),
            CodeBinding {
                code: code.to_string(),
                system,
            },
        );
    }
}

/// What a plain name denotes at the point it is read
///
/// Checked in this order; the IR lowering classifies names the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Alias,
    MeasurementPeriod,
    ValueSet,
    Code,
    CodeSystem,
    Parameter,
    /// A definition, base resource, or something unresolved
    Reference,
}

/// Patient the current expression is evaluated for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientScope {
    /// SQL expression yielding the patient id
    pub id: String,
    /// Alias of a `Patient_view` row in scope, if any
    pub alias: Option<String>,
}

impl PatientScope {
    /// Scope of the `Patient_view p` wrapper
    pub fn wrapper() -> Self {
        Self {
            id: "p.id".to_string(),
            alias: Some("p".to_string()),
        }
    }
}

/// Saved scope sizes, restored when a query is left
#[derive(Debug, Clone, Copy)]
pub struct ScopeMark {
    aliases: usize,
    patients: usize,
}

/// Outcome of generating a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryShape {
    Select(SelectBuilder),
    /// The source names something unresolved
    Missing(String),
    /// The source cannot be read as a relation
    Unsupported(&'static str),
}

/// Which definitions each configured population resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationRefs {
    pub initial_population: Option<String>,
    pub denominator: Option<String>,
    pub numerator: Option<String>,
}

#[derive(Debug)]
pub struct GenerationContext<'o> {
    options: &'o GeneratorOptions,
    declarations: Declarations,
    /// Emitted definitions: declared name to CTE name
    defines: IndexMap<String, String>,
    cte_names: IndexSet<String>,
    resolver: ReferenceResolver,
    aliases: Vec<String>,
    patients: Vec<PatientScope>,
    alias_counter: usize,
    location: Option<SourceLocation>,
    diagnostics: Vec<Diagnostic>,
}

impl<'o> GenerationContext<'o> {
    pub fn new(options: &'o GeneratorOptions, declarations: Declarations) -> Self {
        Self {
            options,
            declarations,
            defines: IndexMap::new(),
            cte_names: IndexSet::new(),
            resolver: ReferenceResolver::new(),
            aliases: Vec::new(),
            patients: Vec::new(),
            alias_counter: 0,
            location: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn options(&self) -> &'o GeneratorOptions {
        self.options
    }

    pub fn declarations(&self) -> &Declarations {
        &self.declarations
    }

    pub fn set_location(&mut self, location: Option<SourceLocation>) {
        self.location = location;
    }

    // === Names ===

    pub fn name_kind(&self, name: &str) -> NameKind {
        let declared = &self.declarations;
        if self.is_alias(name) {
            NameKind::Alias
        } else if is_measurement_period(name) {
            NameKind::MeasurementPeriod
        } else if declared.valuesets.contains_key(name) {
            NameKind::ValueSet
        } else if declared.codes.contains_key(name) {
            NameKind::Code
        } else if declared.codesystems.contains_key(name) {
            NameKind::CodeSystem
        } else if declared.parameters.contains(name) {
            NameKind::Parameter
        } else {
            NameKind::Reference
        }
    }

    pub fn is_include(&self, name: &str) -> bool {
        !self.is_alias(name)
            && self
                .declarations
                .includes
                .iter()
                .any(|include| include.local_name == name)
    }

    /// Record a read of `name` and classify it against the current scope
    pub fn register(&mut self, name: &str) -> ReferenceKind {
        let mut resolver = std::mem::take(&mut self.resolver);
        let kind = resolver.register(name, self.location, &*self);
        self.resolver = resolver;
        kind
    }

    /// Relation that a definition or resource name reads from
    pub fn relation(&self, name: &str) -> Option<SourceTable> {
        if let Some(cte) = self.defines.get(name) {
            return Some(SourceTable::cte(cte));
        }
        let stripped = strip_whitespace(name);
        if let Some(cte) = self.cte_names.get(&stripped) {
            return Some(SourceTable::cte(cte));
        }
        if is_builtin(name) && !is_measurement_period(name) {
            return Some(SourceTable::resource(&stripped));
        }
        None
    }

    pub fn valueset_uri(&self, name: &str) -> Option<&str> {
        self.declarations.valuesets.get(name).map(String::as_str)
    }

    pub fn codesystem_uri(&self, name: &str) -> Option<&str> {
        self.declarations.codesystems.get(name).map(String::as_str)
    }

    pub fn code(&self, name: &str) -> Option<&CodeBinding> {
        self.declarations.codes.get(name)
    }

    /// Value of a declared terminology name as a quoted literal
    pub fn terminology_literal(&self, kind: NameKind, name: &str) -> String {
        let text = match kind {
            NameKind::ValueSet => self.valueset_uri(name),
            NameKind::CodeSystem => self.codesystem_uri(name),
            NameKind::Code => self.code(name).map(|c| c.code.as_str()),
            _ => None,
        };
        quote(text.unwrap_or(name))
    }

    // === Scopes ===

    pub fn mark(&self) -> ScopeMark {
        ScopeMark {
            aliases: self.aliases.len(),
            patients: self.patients.len(),
        }
    }

    pub fn restore(&mut self, mark: ScopeMark) {
        self.aliases.truncate(mark.aliases);
        self.patients.truncate(mark.patients);
    }

    pub fn push_alias(&mut self, alias: &str) {
        self.aliases.push(alias.to_string());
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.iter().any(|a| a == name)
    }

    pub fn push_patient(&mut self, scope: PatientScope) {
        self.patients.push(scope);
    }

    /// Patient id of the innermost scope
    pub fn patient_id(&self) -> String {
        self.patients
            .last()
            .map_or_else(|| "p.id".to_string(), |scope| scope.id.clone())
    }

    /// A `Patient_view` column for the current patient
    pub fn patient_column(&self, column: &str) -> String {
        match self.patients.last() {
            Some(PatientScope { alias: Some(alias), .. }) => format!("{alias}.{column}"),
            Some(PatientScope { id, alias: None }) => {
                format!("(SELECT {column} FROM Patient_view WHERE id = {id})")
            }
            None => format!("p.{column}"),
        }
    }

    /// Fresh alias for an unaliased source
    pub fn next_alias(&mut self, source: &str) -> String {
        self.alias_counter += 1;
        let initial = source
            .chars()
            .find(char::is_ascii_alphabetic)
            .map_or('t', |c| c.to_ascii_lowercase());
        format!("{initial}{}", self.alias_counter)
    }

    // === Definitions ===

    /// Allocate the CTE name for a definition after its body is generated
    pub fn define_cte(&mut self, name: &str) -> String {
        let base = sanitize_cte_name(name);
        let mut candidate = base.clone();
        let mut suffix = 2;
        while is_view_name(&candidate)
            || self
                .cte_names
                .iter()
                .any(|existing| existing.eq_ignore_ascii_case(&candidate))
        {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        if candidate != base {
            self.warn(
                CQL0109,
                format!("CTE name \"{base}\" is already in use; \"{name}\" is emitted as \"{candidate}\""),
            );
        }
        self.cte_names.insert(candidate.clone());
        self.defines.insert(name.to_string(), candidate.clone());
        candidate
    }

    /// CTE for a configured population name
    pub fn population_cte(&self, name: &str) -> Option<String> {
        self.defines
            .get(name)
            .or_else(|| self.cte_names.get(&strip_whitespace(name)))
            .cloned()
    }

    pub fn populations(&self) -> PopulationRefs {
        let populations = &self.options.populations;
        PopulationRefs {
            initial_population: self.population_cte(&populations.initial_population),
            denominator: self.population_cte(&populations.denominator),
            numerator: self.population_cte(&populations.numerator),
        }
    }

    // === Diagnostics ===

    pub fn warn(&mut self, code: ErrorCode, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{code}: {message}");
        let diagnostic = Diagnostic::warning(code, message);
        self.diagnostics.push(match self.location {
            Some(location) => diagnostic.with_location(location),
            None => diagnostic,
        });
    }

    /// Quoted placeholder for a shape that cannot be generated
    pub fn unsupported(&mut self, what: &str) -> String {
        self.warn(CQL0200, format!("unsupported {what} in generated SQL"));
        unsupported(what)
    }

    // === Shared emission ===

    /// Value of the measurement period or a terminology name
    pub fn declared_value(&mut self, kind: NameKind, name: &str) -> String {
        self.register(name);
        match kind {
            NameKind::MeasurementPeriod => self.options.measurement_period.start_sql(),
            kind => self.terminology_literal(kind, name),
        }
    }

    pub fn period_bounds(&mut self, name: &str) -> Bounds {
        self.register(name);
        let period = &self.options.measurement_period;
        Bounds::closed(period.start_sql(), period.end_sql())
    }

    fn resolve_relation(&mut self, name: &str) -> Option<SourceTable> {
        match self.register(name) {
            ReferenceKind::Missing => None,
            _ => self.relation(name),
        }
    }

    /// Body of a definition that is just a name
    pub fn reference_body(&mut self, name: &str) -> CteBody {
        let relation = self.resolve_relation(name);
        match relation {
            Some(table) => CteBody::passthrough(&table.name, table.patient_column),
            None => CteBody::Placeholder {
                missing: name.to_string(),
            },
        }
    }

    /// A definition name in boolean position
    pub fn reference_value(&mut self, name: &str) -> String {
        let relation = self.resolve_relation(name);
        match relation {
            Some(table) => operators::patient_in(
                &self.patient_id(),
                &patient_select(&table.name, table.patient_column),
            ),
            None => missing_condition(name),
        }
    }

    /// A definition name in set position
    pub fn reference_set(&mut self, name: &str, correlate: bool) -> String {
        let relation = self.resolve_relation(name);
        match relation {
            Some(table) if correlate => format!(
                "{} WHERE {} = {}",
                patient_select(&table.name, table.patient_column),
                table.patient_column,
                self.patient_id()
            ),
            Some(table) => patient_select(&table.name, table.patient_column),
            None => missing_set(name),
        }
    }

    pub fn reference_exists(&mut self, name: &str) -> String {
        if self.register(name) == ReferenceKind::Missing {
            return missing_condition(name);
        }
        operators::exists(&self.reference_set(name, true))
    }

    /// Relation behind a query source name
    pub fn source_relation(&mut self, name: &str) -> Result<SourceTable, QueryShape> {
        self.resolve_relation(name)
            .ok_or_else(|| QueryShape::Missing(name.to_string()))
    }

    /// Report a source that is not a retrieve or a definition
    pub fn unsupported_source(&mut self, what: &'static str) -> QueryShape {
        self.warn(CQL0200, format!("unsupported {what}; a placeholder value is emitted"));
        QueryShape::Unsupported(what)
    }

    /// First rows of a query CTE
    pub fn open_query(&self, table: &SourceTable, alias: &str, correlate: bool) -> SelectBuilder {
        let outer = self.patient_id();
        let key = format!("{alias}.{}", table.patient_column);
        let mut select = SelectBuilder::new(format!("{} {alias}", table.name))
            .distinct()
            .column(format!("{key} AS patient_id"));
        if table.is_patient() {
            select = select
                .column(format!("{alias}.birth_date"))
                .column(format!("{alias}.gender"));
        }
        if correlate {
            select.conditions.push(format!("{key} = {outer}"));
        }
        select.conditions.extend(table.status_condition(alias));
        select
    }

    /// Enter the row scope of a query's primary source
    pub fn enter_query(&mut self, table: &SourceTable, alias: &str, user_alias: Option<&str>) {
        if let Some(user_alias) = user_alias {
            self.push_alias(user_alias);
        }
        self.push_patient(PatientScope {
            id: format!("{alias}.{}", table.patient_column),
            alias: table.is_patient().then(|| alias.to_string()),
        });
    }

    /// LEFT JOIN text and the WHERE condition of a relationship clause
    pub fn relationship_join(
        &self,
        without: bool,
        table: &SourceTable,
        alias: &str,
        mut on: Vec<String>,
        such_that: Option<String>,
    ) -> (String, String) {
        let key = format!("{alias}.{}", table.patient_column);
        let condition = if without {
            on.extend(such_that);
            format!("{key} IS NULL")
        } else {
            such_that.unwrap_or_else(|| format!("{key} IS NOT NULL"))
        };
        (
            format!("LEFT JOIN {} {alias} ON {}", table.name, on.join(" AND ")),
            condition,
        )
    }

    pub fn shape_body(&self, shape: QueryShape) -> CteBody {
        match shape {
            QueryShape::Select(select) => CteBody::Select(select),
            QueryShape::Missing(missing) => CteBody::Placeholder { missing },
            QueryShape::Unsupported(what) => {
                CteBody::Select(SelectBuilder::patient_wrapper(unsupported(what)))
            }
        }
    }

    /// Query in `IN`, boolean or set-operation position: patient keys only
    pub fn shape_set(&self, shape: QueryShape) -> String {
        match shape {
            QueryShape::Select(select) => select.inline_ids(),
            other => self.shape_rows(other),
        }
    }

    /// Query read by an aggregate, keeping every projected column
    pub fn shape_rows(&self, shape: QueryShape) -> String {
        match shape {
            QueryShape::Select(select) => select.inline(),
            QueryShape::Missing(name) => missing_set(&name),
            QueryShape::Unsupported(what) => format!("SELECT {}", unsupported(what)),
        }
    }

    /// Code filter against a name: value set, declared code, or text
    pub fn code_filter_name(&self, name: &str, alias: &str, column: &str) -> String {
        if let Some(uri) = self.valueset_uri(name) {
            return self.valueset_membership(uri, column);
        }
        if let Some(code) = self.code(name) {
            return format!(
                "{column} = {} AND {column}_system = {}",
                quote(&code.code),
                quote(&code.system)
            );
        }
        self.code_filter_text(name, alias, column)
    }

    pub fn code_filter_text(&self, text: &str, alias: &str, column: &str) -> String {
        if is_canonical_url(text) {
            self.valueset_membership(text, column)
        } else {
            display_match(alias, text)
        }
    }

    pub fn valueset_membership(&self, url: &str, column: &str) -> String {
        valueset_exists(
            &self.options.valueset_table,
            url,
            column,
            &format!("{column}_system"),
        )
    }

    /// Mapped function call, or a passthrough with a warning
    pub fn call(&mut self, name: &str, args: &[String]) -> String {
        let birth_date = self.patient_column("birth_date");
        match functions::lower_function(name, args, &birth_date) {
            Some(sql) => sql,
            None => {
                self.warn(
                    CQL0201,
                    format!(
                        "function \"{name}\" with {} argument(s) has no SQL mapping; emitted as written",
                        args.len()
                    ),
                );
                functions::passthrough(name, args)
            }
        }
    }

    /// Run the final resolution pass and hand back everything collected
    pub fn finish(self) -> (Resolution, Vec<Diagnostic>) {
        let unloaded: Vec<String> = self
            .declarations
            .includes
            .iter()
            .map(IncludeBinding::describe)
            .collect();
        let resolution = self.resolver.finish(&unloaded);
        (resolution, self.diagnostics)
    }
}

impl ReferenceScope for GenerationContext<'_> {
    fn is_defined(&self, name: &str) -> bool {
        self.defines.contains_key(name)
    }

    fn has_cte(&self, stripped: &str) -> bool {
        self.cte_names.contains(stripped)
    }

    fn is_declared(&self, name: &str) -> bool {
        let declared = &self.declarations;
        declared.valuesets.contains_key(name)
            || declared.codesystems.contains_key(name)
            || declared.codes.contains_key(name)
            || declared.parameters.contains(name)
    }

    fn is_declared_later(&self, name: &str) -> bool {
        self.declarations.defines.contains(name) && !self.defines.contains_key(name)
    }
}
