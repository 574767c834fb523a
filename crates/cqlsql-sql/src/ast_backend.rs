//! SQL generation directly from the AST

use cqlsql_analysis::NamingViolation;
use cqlsql_ast::{
    self as ast, BinaryExpr, BinaryOp, DurationUnit, Expression, LiteralType, MemberAccess,
    RelationshipKind, UnaryExpr, UnaryOp,
};

use crate::context::{
    Declarations, GenerationContext, IncludeBinding, NameKind, PatientScope, QueryShape,
};
use crate::functions;
use crate::operators::{self, Bounds, Operand};
use crate::options::GeneratorOptions;
use crate::render::{Cte, CteBody, SelectBuilder, bind_parameter, is_canonical_url, literal_sql};
use crate::schema::{SourceTable, column_name, nested_column};
use crate::{SqlOutput, finish};

/// Generates CTE SQL by walking the parsed library
#[derive(Debug, Clone, Copy)]
pub struct AstSqlGenerator<'a> {
    options: &'a GeneratorOptions,
    violations: &'a [NamingViolation],
}

impl<'a> AstSqlGenerator<'a> {
    pub fn new(options: &'a GeneratorOptions) -> Self {
        Self {
            options,
            violations: &[],
        }
    }

    /// Naming findings repeated in the SQL header
    pub fn with_violations(mut self, violations: &'a [NamingViolation]) -> Self {
        self.violations = violations;
        self
    }

    pub fn generate(&self, library: &ast::Library) -> SqlOutput {
        let mut walker = Walker {
            library,
            ctx: GenerationContext::new(self.options, declarations(library)),
        };
        let mut ctes = Vec::with_capacity(library.defines.len());
        for define in &library.defines {
            log::debug!("generating \"{}\"", define.name);
            walker.ctx.set_location(Some(define.location));
            let body = walker.define_body(&define.expression);
            let name = walker.ctx.define_cte(&define.name);
            ctes.push(Cte::new(name, &body));
        }
        walker.ctx.set_location(None);
        finish(walker.ctx, self.violations, ctes)
    }
}

fn declarations(library: &ast::Library) -> Declarations {
    let mut declared = Declarations {
        library: library.identifier.clone(),
        version: library.version.clone(),
        ..Declarations::default()
    };
    for codesystem in &library.codesystems {
        declared
            .codesystems
            .insert(codesystem.name.clone(), codesystem.uri.clone());
    }
    for valueset in &library.valuesets {
        declared
            .valuesets
            .insert(valueset.name.clone(), valueset.uri.clone());
    }
    for code in &library.codes {
        declared.bind_code(&code.name, &code.code, &code.system);
    }
    declared
        .parameters
        .extend(library.parameters.iter().map(|p| p.name.clone()));
    declared
        .defines
        .extend(library.defines.iter().map(|d| d.name.clone()));
    declared.includes = library
        .includes
        .iter()
        .map(|include| IncludeBinding {
            local_name: include.local_name().to_string(),
            library: include.library.clone(),
        })
        .collect();
    declared
}

struct Walker<'a, 'o> {
    library: &'a ast::Library,
    ctx: GenerationContext<'o>,
}

impl Walker<'_, '_> {
    fn define_body(&mut self, expr: &Expression) -> CteBody {
        if let Some(name) = self.reference_name(expr) {
            return self.ctx.reference_body(&name);
        }
        match expr {
            Expression::Query(query) => {
                let shape = self.query(query, false);
                self.ctx.shape_body(shape)
            }
            Expression::ResourceReference(_) => {
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

    /// Name read as a definition or resource, including `Library.Name`
    fn reference_name(&self, expr: &Expression) -> Option<String> {
        match expr {
            Expression::Identifier(id) if self.ctx.name_kind(&id.name) == NameKind::Reference => {
                Some(id.name.clone())
            }
            Expression::MemberAccess(member) => match member.object.as_identifier() {
                Some(library) if self.ctx.is_include(library) => {
                    Some(format!("{library}.{}", member.member))
                }
                _ => None,
            },
            _ => None,
        }
    }

    // === Queries ===

    fn query(&mut self, query: &ast::Query, correlate: bool) -> QueryShape {
        self.select_query(
            &query.source,
            query.alias.as_deref(),
            &query.relationships,
            query.where_clause.as_deref(),
            query.return_clause.as_deref(),
            correlate,
        )
    }

    fn select_query(
        &mut self,
        source: &Expression,
        alias: Option<&str>,
        relationships: &[ast::RelationshipClause],
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
        relationships: &[ast::RelationshipClause],
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
        if let Some(filter) = filter {
            select.conditions.push(self.code_filter(filter, &row));
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
        clause: &ast::RelationshipClause,
        table: &SourceTable,
        row: &str,
    ) -> Result<(String, String), QueryShape> {
        let (related, filter) = self.source(&clause.source, "relationship source")?;
        let alias = match &clause.alias {
            Some(alias) => alias.clone(),
            None => self.ctx.next_alias(&related.name),
        };
        let mut on = vec![format!(
            "{alias}.{} = {row}.{}",
            related.patient_column, table.patient_column
        )];
        on.extend(related.status_condition(&alias));
        if let Some(filter) = filter {
            on.push(self.code_filter(filter, &alias));
        }
        if let Some(user_alias) = &clause.alias {
            self.ctx.push_alias(user_alias);
        }
        let such_that = clause.condition.as_deref().map(|c| self.lower(c));
        let without = clause.kind == RelationshipKind::Without;
        Ok(self
            .ctx
            .relationship_join(without, &related, &alias, on, such_that))
    }

    /// Relation read by a query or relationship source
    fn source<'e>(
        &mut self,
        source: &'e Expression,
        what: &'static str,
    ) -> Result<(SourceTable, Option<&'e Expression>), QueryShape> {
        match source {
            Expression::ResourceReference(reference) => Ok((
                SourceTable::resource(&reference.resource_type),
                reference.code_filter.as_deref(),
            )),
            Expression::Identifier(id) if self.ctx.name_kind(&id.name) == NameKind::Reference => {
                Ok((self.ctx.source_relation(&id.name)?, None))
            }
            _ => Err(self.ctx.unsupported_source(what)),
        }
    }

    fn code_filter(&mut self, filter: &Expression, alias: &str) -> String {
        let (property, target) = match filter {
            Expression::Binary(binary)
                if matches!(binary.op, BinaryOp::In | BinaryOp::Equal | BinaryOp::Equivalent) =>
            {
                match binary.left.as_identifier() {
                    Some(property) => (property, binary.right.as_ref()),
                    None => ("code", filter),
                }
            }
            _ => ("code", filter),
        };
        let column = format!("{alias}.{}", column_name(property));
        match target {
            Expression::Identifier(id) => self.ctx.code_filter_name(&id.name, alias, &column),
            Expression::Literal(literal) if literal.value_type == LiteralType::String => {
                self.ctx.code_filter_text(&literal.value, alias, &column)
            }
            other => {
                let value = self.lower(other);
                format!("{column} IN ({value})")
            }
        }
    }

    // === Sets ===

    fn set(&mut self, expr: &Expression, correlate: bool) -> String {
        if let Some(name) = self.reference_name(expr) {
            return self.ctx.reference_set(&name, correlate);
        }
        match expr {
            Expression::ResourceReference(_) => {
                let shape = self.select_query(expr, None, &[], None, None, correlate);
                self.ctx.shape_set(shape)
            }
            Expression::Query(query) => {
                let shape = self.query(query, correlate);
                self.ctx.shape_set(shape)
            }
            Expression::Binary(binary) if binary.op.is_set_operation() => {
                self.set_operation(binary, correlate)
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

    fn set_operation(&mut self, binary: &BinaryExpr, correlate: bool) -> String {
        let left = self.set(&binary.left, correlate);
        let right = self.set(&binary.right, correlate);
        operators::binary(binary.op, &Operand::value(left), &Operand::value(right))
    }

    fn is_set(&self, expr: &Expression) -> bool {
        match expr {
            Expression::Query(_) | Expression::ResourceReference(_) => true,
            Expression::Binary(binary) => binary.op.is_set_operation(),
            other => self.reference_name(other).is_some(),
        }
    }

    // === Values ===

    fn lower(&mut self, expr: &Expression) -> String {
        match expr {
            Expression::Literal(literal) => literal_sql(literal.value_type, &literal.value),
            Expression::Identifier(id) => self.identifier(&id.name),
            Expression::MemberAccess(member) => self.member(member),
            Expression::FunctionCall(call) => {
                let name = functions::local_name(&call.name);
                let args: Vec<String> = if functions::is_aggregate(name, call.args.len()) {
                    call.args.iter().map(|arg| self.rows(arg)).collect()
                } else {
                    call.args.iter().map(|arg| self.lower(arg)).collect()
                };
                self.ctx.call(name, &args)
            }
            Expression::Binary(binary) => self.binary(binary),
            Expression::Unary(unary) => self.unary(unary),
            Expression::Timing(timing) => {
                let left = self.operand(&timing.left);
                let right = self.operand(&timing.right);
                operators::timing_window(
                    &left,
                    &right,
                    &timing.amount,
                    timing.unit,
                    timing.bound,
                    timing.direction,
                )
            }
            Expression::Interval(_) => self.ctx.unsupported("interval"),
            Expression::ResourceReference(_) | Expression::Query(_) => {
                let set = self.set(expr, false);
                operators::patient_in(&self.ctx.patient_id(), &set)
            }
        }
    }

    fn identifier(&mut self, name: &str) -> String {
        match self.ctx.name_kind(name) {
            NameKind::Alias => name.to_string(),
            NameKind::Parameter => {
                self.ctx.register(name);
                self.parameter_value(name)
            }
            NameKind::Reference => self.ctx.reference_value(name),
            kind => self.ctx.declared_value(kind, name),
        }
    }

    /// Literal defaults are inlined; anything else becomes a bind parameter
    fn parameter_value(&self, name: &str) -> String {
        match self.library.parameter(name).and_then(|p| p.default.as_ref()) {
            Some(Expression::Literal(literal)) => literal_sql(literal.value_type, &literal.value),
            _ => bind_parameter(name),
        }
    }

    fn member(&mut self, member: &MemberAccess) -> String {
        if let Some((alias, path)) = self.alias_path(member) {
            return format!("{alias}.{}", nested_column(&path));
        }
        if let Some(name) = member.object.as_identifier() {
            if self.ctx.is_include(name) {
                return self.ctx.reference_value(&format!("{name}.{}", member.member));
            }
            if name == "Patient" && self.ctx.name_kind(name) != NameKind::Alias {
                return self.ctx.patient_column(&column_name(&member.member));
            }
        }
        let object = self.lower(&member.object);
        format!("{object}.{}", column_name(&member.member))
    }

    /// `E.period.start` -> (`E`, [`period`, `start`]) when `E` is an alias
    fn alias_path<'e>(&self, member: &'e MemberAccess) -> Option<(&'e str, Vec<&'e str>)> {
        let mut path = vec![member.member.as_str()];
        let mut object = member.object.as_ref();
        loop {
            match object {
                Expression::Identifier(id) if self.ctx.is_alias(&id.name) => {
                    path.reverse();
                    return Some((id.name.as_str(), path));
                }
                Expression::MemberAccess(inner) => {
                    path.push(&inner.member);
                    object = &inner.object;
                }
                _ => return None,
            }
        }
    }

    fn binary(&mut self, binary: &BinaryExpr) -> String {
        let op = binary.op;
        if op.is_set_operation() {
            let set = self.set_operation(binary, false);
            return operators::patient_in(&self.ctx.patient_id(), &set);
        }
        if op == BinaryOp::In {
            if let Some(url) = self.valueset_target(&binary.right) {
                if let Some(column) = self.code_column(&binary.left) {
                    return self.ctx.valueset_membership(&url, &column);
                }
            }
            if self.is_set(&binary.right) {
                let left = self.lower(&binary.left);
                let set = self.set(&binary.right, false);
                return format!("{left} IN ({set})");
            }
        }
        if let (BinaryOp::Add | BinaryOp::Subtract, Expression::Literal(quantity)) =
            (op, binary.right.as_ref())
        {
            let unit = quantity.unit.as_deref().and_then(DurationUnit::from_keyword);
            if let (LiteralType::Quantity, Some(unit)) = (quantity.value_type, unit) {
                let base = self.lower(&binary.left);
                return operators::date_shift(&base, op, &quantity.value, unit);
            }
        }
        let left = self.operand(&binary.left);
        let right = self.operand(&binary.right);
        operators::binary(op, &left, &right)
    }

    /// Value set URL on the right of `in`
    fn valueset_target(&mut self, expr: &Expression) -> Option<String> {
        match expr {
            Expression::Identifier(id) => match self.ctx.name_kind(&id.name) {
                NameKind::ValueSet => {
                    self.ctx.register(&id.name);
                    self.ctx.valueset_uri(&id.name).map(str::to_string)
                }
                NameKind::Reference if is_canonical_url(&id.name) => Some(id.name.clone()),
                _ => None,
            },
            Expression::Literal(literal)
                if literal.value_type == LiteralType::String && is_canonical_url(&literal.value) =>
            {
                Some(literal.value.clone())
            }
            _ => None,
        }
    }

    fn code_column(&self, expr: &Expression) -> Option<String> {
        match expr {
            Expression::MemberAccess(member) => self
                .alias_path(member)
                .map(|(alias, path)| format!("{alias}.{}", nested_column(&path))),
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
            Expression::Identifier(id) => match self.ctx.name_kind(&id.name) {
                NameKind::MeasurementPeriod => Some(self.ctx.period_bounds(&id.name)),
                NameKind::Parameter => {
                    let library = self.library;
                    let interval = match library.parameter(&id.name)?.default.as_ref()? {
                        Expression::Interval(interval) => interval,
                        _ => return None,
                    };
                    let (Some(Expression::Literal(low)), Some(Expression::Literal(high))) =
                        (interval.start.as_deref(), interval.end.as_deref())
                    else {
                        return None;
                    };
                    self.ctx.register(&id.name);
                    Some(Bounds {
                        low: literal_sql(low.value_type, &low.value),
                        high: literal_sql(high.value_type, &high.value),
                        low_closed: interval.start_closed,
                        high_closed: interval.end_closed,
                    })
                }
                _ => None,
            },
            Expression::Interval(interval) => {
                let low = interval
                    .start
                    .as_deref()
                    .map_or_else(|| "NULL".to_string(), |e| self.lower(e));
                let high = interval
                    .end
                    .as_deref()
                    .map_or_else(|| "NULL".to_string(), |e| self.lower(e));
                Some(Bounds {
                    low,
                    high,
                    low_closed: interval.start_closed,
                    high_closed: interval.end_closed,
                })
            }
            Expression::MemberAccess(member) => {
                let (alias, mut path) = self.alias_path(member)?;
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

    fn unary(&mut self, unary: &UnaryExpr) -> String {
        match unary.op {
            UnaryOp::Not => match unary.operand.as_ref() {
                Expression::Unary(inner) if inner.op == UnaryOp::IsNull => {
                    operators::is_not_null(&self.lower(&inner.operand))
                }
                operand => operators::not(&self.lower(operand)),
            },
            UnaryOp::IsNull => operators::is_null(&self.lower(&unary.operand)),
            UnaryOp::IsNotNull => operators::is_not_null(&self.lower(&unary.operand)),
            UnaryOp::Negate => operators::negate(&self.lower(&unary.operand)),
            UnaryOp::Exists => match self.reference_name(&unary.operand) {
                Some(name) => self.ctx.reference_exists(&name),
                None => operators::exists(&self.set(&unary.operand, true)),
            },
            UnaryOp::StartOf => match self.bounds(&unary.operand) {
                Some(bounds) => bounds.low,
                None => self.lower(&unary.operand),
            },
            UnaryOp::EndOf => match self.bounds(&unary.operand) {
                Some(bounds) => bounds.high,
                None => self.lower(&unary.operand),
            },
        }
    }
}
