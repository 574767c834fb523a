//! SQL generation from the IR
//!
//! Walks the lowered library in the same order as the AST backend, so
//! both produce identical SQL for the same document.

use cqlsql_analysis::NamingViolation;
use cqlsql_ast::{BinaryOp, DurationUnit, UnaryOp};
use cqlsql_ir::{
    self as ir, BinaryExpression, Expression, IntervalExpression, Property, RelationshipClause,
    local_type_name,
};

use crate::context::{
    Declarations, GenerationContext, IncludeBinding, NameKind, PatientScope, QueryShape,
};
use crate::functions;
use crate::operators::{self, Bounds, Operand};
use crate::options::GeneratorOptions;
use crate::render::{
    Cte, CteBody, SelectBuilder, bind_parameter, is_canonical_url, literal_sql, literal_type,
    quote,
};
use crate::schema::{SourceTable, column_name, nested_column};
use crate::{SqlOutput, finish};

/// Generates CTE SQL from a lowered library
#[derive(Debug, Clone, Copy)]
pub struct IrSqlGenerator<'a> {
    options: &'a GeneratorOptions,
    violations: &'a [NamingViolation],
}

impl<'a> IrSqlGenerator<'a> {
    pub fn new(options: &'a GeneratorOptions) -> Self {
        Self {
            options,
            violations: &[],
        }
    }

    pub fn with_violations(mut self, violations: &'a [NamingViolation]) -> Self {
        self.violations = violations;
        self
    }

    pub fn generate(&self, library: &ir::Library) -> SqlOutput {
        let mut walker = Walker {
            library,
            ctx: GenerationContext::new(self.options, declarations(library)),
        };
        let mut ctes = Vec::with_capacity(library.statements.len());
        for statement in &library.statements {
            log::debug!("generating \"{}\" from IR", statement.name);
            let location = statement.element.locator.as_deref().and_then(ir::parse_locator);
            walker.ctx.set_location(location);
            let body = walker.define_body(&statement.expression);
            let name = walker.ctx.define_cte(&statement.name);
            ctes.push(Cte::new(name, &body));
        }
        walker.ctx.set_location(None);
        finish(walker.ctx, self.violations, ctes)
    }
}

fn declarations(library: &ir::Library) -> Declarations {
    let identifier = &library.identifier;
    let mut declared = Declarations {
        library: Some(identifier.id.clone()),
        version: identifier.version.clone(),
        ..Declarations::default()
    };
    for codesystem in &library.code_systems {
        declared
            .codesystems
            .insert(codesystem.name.clone(), codesystem.id.clone());
    }
    for valueset in &library.value_sets {
        declared
            .valuesets
            .insert(valueset.name.clone(), valueset.id.clone());
    }
    for code in &library.codes {
        declared.bind_code(&code.name, &code.id, &code.code_system);
    }
    declared
        .parameters
        .extend(library.parameters.iter().map(|p| p.name.clone()));
    declared
        .defines
        .extend(library.statements.iter().map(|s| s.name.clone()));
    declared.includes = library
        .includes
        .iter()
        .map(|include| IncludeBinding {
            local_name: include.local_identifier.clone(),
            library: include.path.clone(),
        })
        .collect();
    declared
}

/// Literal-valued IR node as SQL
fn literal_value(expr: &Expression) -> Option<String> {
    match expr {
        Expression::Null(_) => Some("NULL".to_string()),
        Expression::Literal(literal) => Some(match literal_type(literal.type_name()) {
            Some(value_type) => literal_sql(value_type, &literal.value),
            None => quote(&literal.value),
        }),
        Expression::Quantity(quantity) => Some(quantity.value.clone()),
        _ => None,
    }
}

fn is_string(literal: &ir::Literal) -> bool {
    local_type_name(&literal.value_type) == "String"
}

struct Walker<'a, 'o> {
    library: &'a ir::Library,
    ctx: GenerationContext<'o>,
}

impl Walker<'_, '_> {
    fn define_body(&mut self, expr: &Expression) -> CteBody {
        if let Some(name) = reference_name(expr) {
            return self.ctx.reference_body(&name);
        }
        match expr {
            Expression::Query(query) => {
                let shape = self.query(query, false);
                self.ctx.shape_body(shape)
            }
            Expression::Retrieve(_) => {
                let shape = self.select_query(expr, None, &[], None, None, false);
                self.ctx.shape_body(shape)
            }
            other => CteBody::Select(self.patient_wrapper(other)),
        }
    }

    fn patient_wrapper(&mut self, expr: &Expression) -> SelectBuilder {
        let mark = self.ctx.mark();
        self.ctx.push_patient(PatientScope::wrapper());
        let condition = self.lower(expr);
        self.ctx.restore(mark);
        SelectBuilder::patient_wrapper(condition)
    }

    // === Queries ===

    fn query(&mut self, query: &ir::Query, correlate: bool) -> QueryShape {
        let Some(source) = query.primary_source() else {
            return self.ctx.unsupported_source("query source");
        };
        self.select_query(
            &source.expression,
            source.alias.as_deref(),
            &query.relationship,
            query.where_clause.as_deref(),
            query.return_clause.as_ref().map(|r| r.expression.as_ref()),
            correlate,
        )
    }

    fn select_query(
        &mut self,
        source: &Expression,
        alias: Option<&str>,
        relationships: &[RelationshipClause],
        where_clause: Option<&Expression>,
        return_clause: Option<&Expression>,
        correlate: bool,
    ) -> QueryShape {
        let mark = self.ctx.mark();
        let shape = self.select_query_in_scope(
            source,
            alias,
            relationships,
            where_clause,
            return_clause,
            correlate,
        );
        self.ctx.restore(mark);
        shape
    }

    fn select_query_in_scope(
        &mut self,
        source: &Expression,
        alias: Option<&str>,
        relationships: &[RelationshipClause],
        where_clause: Option<&Expression>,
        return_clause: Option<&Expression>,
        correlate: bool,
    ) -> QueryShape {
        let (table, filter) = match self.source(source, "query source") {
            Ok(source) => source,
            Err(shape) => return shape,
        };
        let row = match alias {
            Some(alias) => alias.to_string(),
            None => self.ctx.next_alias(&table.name),
        };
        let mut select = self.ctx.open_query(&table, &row, correlate);
        if let Some(retrieve) = filter {
            if let Some(condition) = self.code_filter(retrieve, &row) {
                select.conditions.push(condition);
            }
        }
        self.ctx.enter_query(&table, &row, alias);

        let mut relationship_conditions = Vec::with_capacity(relationships.len());
        for clause in relationships {
            match self.relationship(clause, &table, &row) {
                Ok((join, condition)) => {
                    select.joins.push(join);
                    relationship_conditions.push(condition);
                }
                Err(shape) => return shape,
            }
        }
        select.conditions.extend(relationship_conditions);

        if let Some(condition) = where_clause {
            select.conditions.push(self.lower(condition));
        }
        if let Some(value) = return_clause {
            let value = self.lower(value);
            select.columns.push(format!("{value} AS return_value"));
        }
        QueryShape::Select(select)
    }

    fn relationship(
        &mut self,
        clause: &RelationshipClause,
        table: &SourceTable,
        row: &str,
    ) -> Result<(String, String), QueryShape> {
        let relationship = clause.relationship();
        let (related, filter) = self.source(&relationship.expression, "relationship source")?;
        let alias = match &relationship.alias {
            Some(alias) => alias.clone(),
            None => self.ctx.next_alias(&related.name),
        };
        let mut on = vec![format!(
            "{alias}.{} = {row}.{}",
            related.patient_column, table.patient_column
        )];
        on.extend(related.status_condition(&alias));
        if let Some(retrieve) = filter {
            on.extend(self.code_filter(retrieve, &alias));
        }
        if let Some(user_alias) = &relationship.alias {
            self.ctx.push_alias(user_alias);
        }
        let such_that = relationship.such_that.as_deref().map(|c| self.lower(c));
        Ok(self
            .ctx
            .relationship_join(clause.is_without(), &related, &alias, on, such_that))
    }

    /// Relation read by a query or relationship source
    fn source<'e>(
        &mut self,
        source: &'e Expression,
        what: &'static str,
    ) -> Result<(SourceTable, Option<&'e ir::Retrieve>), QueryShape> {
        match source {
            Expression::Retrieve(retrieve) => {
                Ok((SourceTable::resource(&retrieve.data_type), Some(retrieve)))
            }
            Expression::ExpressionRef(reference) | Expression::IdentifierRef(reference)
                if reference.library_name.is_none() =>
            {
                Ok((self.ctx.source_relation(&reference.name)?, None))
            }
            // already reported while lowering
            Expression::Null(_) => Err(QueryShape::Unsupported(what)),
            _ => Err(self.ctx.unsupported_source(what)),
        }
    }

    fn code_filter(&mut self, retrieve: &ir::Retrieve, alias: &str) -> Option<String> {
        let target = retrieve.codes.as_deref()?;
        let property = retrieve.code_property.as_deref().unwrap_or("code");
        let column = format!("{alias}.{}", column_name(property));
        Some(match target {
            Expression::ValueSetRef(reference)
            | Expression::CodeRef(reference)
            | Expression::IdentifierRef(reference) => {
                self.ctx.code_filter_name(&reference.name, alias, &column)
            }
            Expression::Literal(literal) if is_string(literal) => {
                self.ctx.code_filter_text(&literal.value, alias, &column)
            }
            other => {
                let value = self.lower(other);
                format!("{column} IN ({value})")
            }
        })
    }

    // === Sets ===

    fn set(&mut self, expr: &Expression, correlate: bool) -> String {
        if let Some(name) = reference_name(expr) {
            return self.ctx.reference_set(&name, correlate);
        }
        match expr {
            Expression::Retrieve(_) => {
                let shape = self.select_query(expr, None, &[], None, None, correlate);
                self.ctx.shape_set(shape)
            }
            Expression::Query(query) => {
                let shape = self.query(query, correlate);
                self.ctx.shape_set(shape)
            }
            Expression::Union(node) | Expression::Except(node) | Expression::Intersect(node) => {
                let op = set_operator(expr);
                self.set_operation(op, node, correlate)
            }
            other => format!("SELECT {}", self.lower(other)),
        }
    }

    /// Aggregate operand; a query keeps its `return_value` column
    fn rows(&mut self, expr: &Expression) -> String {
        match expr {
            Expression::Query(query) => {
                let shape = self.query(query, true);
                self.ctx.shape_rows(shape)
            }
            other => self.set(other, true),
        }
    }

    fn set_operation(&mut self, op: BinaryOp, node: &BinaryExpression, correlate: bool) -> String {
        let left = self.set(node.left(), correlate);
        let right = self.set(node.right(), correlate);
        operators::binary(op, &Operand::value(left), &Operand::value(right))
    }

    // === Values ===

    fn lower(&mut self, expr: &Expression) -> String {
        if let Some(value) = literal_value(expr) {
            return value;
        }
        if let Some((op, node)) = expr.as_binary() {
            return self.binary(op, node);
        }
        match expr {
            Expression::AliasRef(reference) => reference.name.clone(),
            Expression::ParameterRef(reference) => self.parameter(&reference.name),
            Expression::ValueSetRef(reference) => {
                self.ctx.declared_value(NameKind::ValueSet, &reference.name)
            }
            Expression::CodeRef(reference) => {
                self.ctx.declared_value(NameKind::Code, &reference.name)
            }
            Expression::CodeSystemRef(reference) => {
                self.ctx.declared_value(NameKind::CodeSystem, &reference.name)
            }
            Expression::ExpressionRef(reference) | Expression::IdentifierRef(reference) => {
                self.ctx.reference_value(&reference.qualified_name())
            }
            Expression::Property(property) => self.property(property),
            Expression::FunctionRef(call) => {
                let args: Vec<String> = if functions::is_aggregate(&call.name, call.operand.len()) {
                    call.operand.iter().map(|arg| self.rows(arg)).collect()
                } else {
                    call.operand.iter().map(|arg| self.lower(arg)).collect()
                };
                self.ctx.call(&call.name, &args)
            }
            Expression::Not(node) => match node.operand.as_ref() {
                Expression::IsNull(inner) => operators::is_not_null(&self.lower(&inner.operand)),
                operand => operators::not(&self.lower(operand)),
            },
            Expression::IsNull(node) => operators::is_null(&self.lower(&node.operand)),
            Expression::Negate(node) => operators::negate(&self.lower(&node.operand)),
            Expression::Exists(node) => match reference_name(&node.operand) {
                Some(name) => self.ctx.reference_exists(&name),
                None => operators::exists(&self.set(&node.operand, true)),
            },
            Expression::Start(node) => self.interval_end(&node.operand, UnaryOp::StartOf),
            Expression::End(node) => self.interval_end(&node.operand, UnaryOp::EndOf),
            Expression::Timing(timing) => {
                let (Some(left), Some(right)) = (timing.operand.first(), timing.operand.get(1))
                else {
                    return self.ctx.unsupported("timing expression");
                };
                let left = self.operand(left);
                let right = self.operand(right);
                operators::timing_window(
                    &left,
                    &right,
                    &timing.value,
                    timing.unit,
                    timing.bound,
                    timing.direction,
                )
            }
            Expression::Interval(_) => self.ctx.unsupported("interval"),
            Expression::Retrieve(_) | Expression::Query(_) => {
                let set = self.set(expr, false);
                operators::patient_in(&self.ctx.patient_id(), &set)
            }
            // literals and binary nodes are handled above
            _ => "NULL".to_string(),
        }
    }

    fn parameter(&mut self, name: &str) -> String {
        if self.ctx.name_kind(name) == NameKind::MeasurementPeriod {
            return self.ctx.declared_value(NameKind::MeasurementPeriod, name);
        }
        self.ctx.register(name);
        self.library
            .parameter(name)
            .and_then(|p| p.default_expr.as_deref())
            .and_then(literal_value)
            .unwrap_or_else(|| bind_parameter(name))
    }

    fn property(&mut self, property: &Property) -> String {
        if let Some((alias, path)) = alias_path(property) {
            return format!("{alias}.{}", nested_column(&path));
        }
        match property.source.as_deref() {
            Some(source)
                if source.reference_name() == Some("Patient")
                    && !matches!(source, Expression::AliasRef(_)) =>
            {
                self.ctx.patient_column(&column_name(&property.path))
            }
            Some(source) => {
                let object = self.lower(source);
                format!("{object}.{}", column_name(&property.path))
            }
            None => column_name(&property.path),
        }
    }

    fn binary(&mut self, op: BinaryOp, node: &BinaryExpression) -> String {
        let (left, right) = (node.left(), node.right());
        if op.is_set_operation() {
            let set = self.set_operation(op, node, false);
            return operators::patient_in(&self.ctx.patient_id(), &set);
        }
        if op == BinaryOp::In {
            if let Some(url) = self.valueset_target(right) {
                if let Some((alias, path)) = property_path(left) {
                    let column = format!("{alias}.{}", nested_column(&path));
                    return self.ctx.valueset_membership(&url, &column);
                }
            }
            if is_set(right) {
                let left = self.lower(left);
                let set = self.set(right, false);
                return format!("{left} IN ({set})");
            }
        }
        if let (BinaryOp::Add | BinaryOp::Subtract, Expression::Quantity(quantity)) = (op, right) {
            if let Some(unit) = DurationUnit::from_keyword(&quantity.unit) {
                let base = self.lower(left);
                return operators::date_shift(&base, op, &quantity.value, unit);
            }
        }
        let left = self.operand(left);
        let right = self.operand(right);
        operators::binary(op, &left, &right)
    }

    fn valueset_target(&mut self, expr: &Expression) -> Option<String> {
        match expr {
            Expression::ValueSetRef(reference) => {
                self.ctx.register(&reference.name);
                self.ctx.valueset_uri(&reference.name).map(str::to_string)
            }
            Expression::ExpressionRef(reference) | Expression::IdentifierRef(reference)
                if reference.library_name.is_none() && is_canonical_url(&reference.name) =>
            {
                Some(reference.name.clone())
            }
            Expression::Literal(literal) if is_string(literal) && is_canonical_url(&literal.value) => {
                Some(literal.value.clone())
            }
            _ => None,
        }
    }

    fn operand(&mut self, expr: &Expression) -> Operand {
        match self.bounds(expr) {
            Some(bounds) => Operand::interval(bounds),
            None => Operand::value(self.lower(expr)),
        }
    }

    fn bounds(&mut self, expr: &Expression) -> Option<Bounds> {
        match expr {
            Expression::ParameterRef(reference) => {
                if self.ctx.name_kind(&reference.name) == NameKind::MeasurementPeriod {
                    return Some(self.ctx.period_bounds(&reference.name));
                }
                let library = self.library;
                let interval = match library.parameter(&reference.name)?.default_expr.as_deref()? {
                    Expression::Interval(interval) => interval,
                    _ => return None,
                };
                let (Some(low), Some(high)) = (
                    interval.low.as_deref().and_then(literal_value),
                    interval.high.as_deref().and_then(literal_value),
                ) else {
                    return None;
                };
                self.ctx.register(&reference.name);
                Some(Bounds {
                    low,
                    high,
                    low_closed: interval.low_closed,
                    high_closed: interval.high_closed,
                })
            }
            Expression::Interval(interval) => Some(self.interval_bounds(interval)),
            Expression::Property(property) => {
                let (alias, mut path) = alias_path(property)?;
                if path.last() != Some(&"period") {
                    return None;
                }
                path.push("start");
                let low = format!("{alias}.{}", nested_column(&path));
                path.pop();
                path.push("end");
                let high = format!("{alias}.{}", nested_column(&path));
                Some(Bounds::closed(low, high))
            }
            _ => None,
        }
    }

    fn interval_bounds(&mut self, interval: &IntervalExpression) -> Bounds {
        let low = interval
            .low
            .as_deref()
            .map_or_else(|| "NULL".to_string(), |e| self.lower(e));
        let high = interval
            .high
            .as_deref()
            .map_or_else(|| "NULL".to_string(), |e| self.lower(e));
        Bounds {
            low,
            high,
            low_closed: interval.low_closed,
            high_closed: interval.high_closed,
        }
    }

    fn interval_end(&mut self, operand: &Expression, end: UnaryOp) -> String {
        match self.bounds(operand) {
            Some(bounds) if end == UnaryOp::StartOf => bounds.low,
            Some(bounds) => bounds.high,
            None => self.lower(operand),
        }
    }
}

/// Name read as a definition or resource, including `Library.Name`
fn reference_name(expr: &Expression) -> Option<String> {
    match expr {
        Expression::ExpressionRef(reference) | Expression::IdentifierRef(reference) => {
            Some(reference.qualified_name())
        }
        _ => None,
    }
}

fn is_set(expr: &Expression) -> bool {
    matches!(
        expr,
        Expression::Query(_)
            | Expression::Retrieve(_)
            | Expression::Union(_)
            | Expression::Except(_)
            | Expression::Intersect(_)
            | Expression::ExpressionRef(_)
            | Expression::IdentifierRef(_)
    )
}

fn set_operator(expr: &Expression) -> BinaryOp {
    match expr {
        Expression::Except(_) => BinaryOp::Except,
        Expression::Intersect(_) => BinaryOp::Intersect,
        _ => BinaryOp::Union,
    }
}

/// `E.period.start` -> (`E`, [`period`, `start`]) for alias-scoped properties
fn alias_path(property: &Property) -> Option<(&str, Vec<&str>)> {
    let mut path = vec![property.path.as_str()];
    let mut current = property;
    loop {
        if let Some(scope) = &current.scope {
            path.reverse();
            return Some((scope.as_str(), path));
        }
        match current.source.as_deref() {
            Some(Expression::Property(inner)) => {
                path.push(&inner.path);
                current = inner;
            }
            _ => return None,
        }
    }
}

fn property_path(expr: &Expression) -> Option<(&str, Vec<&str>)> {
    match expr {
        Expression::Property(property) => alias_path(property),
        _ => None,
    }
}
