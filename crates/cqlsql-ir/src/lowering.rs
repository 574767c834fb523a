//! AST to IR lowering
//!
//! Lowering is total: shapes the IR cannot express become a null literal
//! with a warning, never an error.

use cqlsql_ast::{
    self as ast, BinaryOp, Expression as AstExpression, Library as AstLibrary, LiteralType,
    RelationshipKind, UnaryOp,
};
use cqlsql_analysis::is_measurement_period;
use cqlsql_diagnostics::{CQL0203, Diagnostic, SourceLocation};
use std::collections::HashMap;

use crate::model::{
    AliasedQuerySource, CodeDef, CodeSystemDef, Element, Expression, ExpressionDef, FunctionRef,
    IncludeDef, IntervalExpression, Library, Literal, NullLiteral, ParameterDef, Property,
    Quantity, Query, Reference, Relationship, RelationshipClause, Retrieve, ReturnClause,
    TimingExpression, UnaryExpression, UsingDef, ValueSetDef, system_type,
};

/// Lowered library plus the warnings raised while lowering
#[derive(Debug, Clone, PartialEq)]
pub struct Lowered {
    pub library: Library,
    pub diagnostics: Vec<Diagnostic>,
}

/// Lower a parsed library
pub fn lower(library: &AstLibrary) -> Lowered {
    let mut converter = AstToIrConverter::new(library);
    let library = converter.convert_library();
    Lowered {
        library,
        diagnostics: converter.diagnostics,
    }
}

/// AST to IR converter for one library
#[derive(Debug)]
pub struct AstToIrConverter<'a> {
    source: &'a AstLibrary,
    /// Query aliases in scope, innermost last
    aliases: Vec<String>,
    /// Result types of already lowered definitions
    def_types: HashMap<String, String>,
    location: Option<SourceLocation>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> AstToIrConverter<'a> {
    pub fn new(source: &'a AstLibrary) -> Self {
        Self {
            source,
            aliases: Vec::new(),
            def_types: HashMap::new(),
            location: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Convert the whole library
    pub fn convert_library(&mut self) -> Library {
        let source = self.source;
        let mut library = Library::new(
            source.identifier.clone().unwrap_or_else(|| "Anonymous".to_string()),
            source.version.clone(),
        );

        library.usings = source
            .usings
            .iter()
            .map(|u| UsingDef {
                local_identifier: u.model.clone(),
                version: u.version.clone(),
            })
            .collect();
        library.includes = source
            .includes
            .iter()
            .map(|i| IncludeDef {
                local_identifier: i.local_name().to_string(),
                path: i.library.clone(),
                version: i.version.clone(),
            })
            .collect();
        library.code_systems = source
            .codesystems
            .iter()
            .map(|c| CodeSystemDef {
                name: c.name.clone(),
                id: c.uri.clone(),
                version: c.version.clone(),
            })
            .collect();
        library.value_sets = source
            .valuesets
            .iter()
            .map(|v| ValueSetDef {
                name: v.name.clone(),
                id: v.uri.clone(),
            })
            .collect();
        library.codes = source
            .codes
            .iter()
            .map(|c| CodeDef {
                name: c.name.clone(),
                id: c.code.clone(),
                code_system: c.system.clone(),
                display: c.display.clone(),
            })
            .collect();

        for parameter in &source.parameters {
            self.location = Some(parameter.location);
            let default_expr = parameter
                .default
                .as_ref()
                .map(|d| Box::new(self.convert_expression(d)));
            library.parameters.push(ParameterDef {
                name: parameter.name.clone(),
                parameter_type_name: parameter.data_type.clone(),
                default_expr,
            });
        }

        for define in &source.defines {
            library.statements.push(self.convert_define(define));
        }

        log::debug!(
            "lowered {} definitions of library {}",
            library.statements.len(),
            library.identifier.id
        );
        library
    }

    fn convert_define(&mut self, define: &ast::Define) -> ExpressionDef {
        self.location = Some(define.location);
        let expression = self.convert_expression(&define.expression);
        let result_type_name = expression.result_type_name().map(str::to_string);
        if let Some(result_type) = &result_type_name {
            self.def_types.insert(define.name.clone(), result_type.clone());
        }
        ExpressionDef {
            element: Element {
                locator: Some(define.location.to_string()),
                result_type_name,
            },
            name: define.name.clone(),
            context: define.context.clone(),
            expression: Box::new(expression),
        }
    }

    /// Convert one expression
    pub fn convert_expression(&mut self, expr: &AstExpression) -> Expression {
        match expr {
            AstExpression::Literal(literal) => self.convert_literal(literal),
            AstExpression::Identifier(id) => self.convert_identifier(&id.name),
            AstExpression::MemberAccess(member) => self.convert_member(member),
            AstExpression::FunctionCall(call) => {
                let (library_name, name) = match call.name.rsplit_once('.') {
                    Some((library, name)) => (Some(library.to_string()), name.to_string()),
                    None => (None, call.name.clone()),
                };
                let operand: Vec<Box<Expression>> = call
                    .args
                    .iter()
                    .map(|arg| Box::new(self.convert_expression(arg)))
                    .collect();
                let first = operand.first().and_then(|arg| arg.result_type_name());
                Expression::FunctionRef(FunctionRef {
                    element: Element {
                        locator: None,
                        result_type_name: function_type(&name, first),
                    },
                    library_name,
                    name,
                    operand,
                })
            }
            AstExpression::Binary(binary) => self.convert_binary_op(binary),
            AstExpression::Unary(unary) => self.convert_unary_op(unary),
            AstExpression::Timing(timing) => Expression::Timing(TimingExpression {
                element: Element::typed(system_type("Boolean")),
                operand: vec![
                    Box::new(self.convert_expression(&timing.left)),
                    Box::new(self.convert_expression(&timing.right)),
                ],
                value: timing.amount.clone(),
                unit: timing.unit,
                bound: timing.bound,
                direction: timing.direction,
            }),
            AstExpression::Interval(interval) => Expression::Interval(IntervalExpression {
                element: Element::typed("Interval"),
                low: interval
                    .start
                    .as_deref()
                    .map(|e| Box::new(self.convert_expression(e))),
                high: interval
                    .end
                    .as_deref()
                    .map(|e| Box::new(self.convert_expression(e))),
                low_closed: interval.start_closed,
                high_closed: interval.end_closed,
            }),
            AstExpression::ResourceReference(reference) => self.convert_retrieve(reference),
            AstExpression::Query(query) => self.convert_query(query),
        }
    }

    fn convert_literal(&self, literal: &ast::Literal) -> Expression {
        match literal.value_type {
            LiteralType::Null => Expression::Null(NullLiteral::default()),
            LiteralType::Quantity => Expression::Quantity(Quantity {
                element: Element::typed(system_type("Quantity")),
                value: literal.value.clone(),
                unit: literal.unit.clone().unwrap_or_default(),
            }),
            value_type => {
                let type_name = system_type(&value_type.to_string());
                Expression::Literal(Literal {
                    element: Element::typed(type_name.clone()),
                    value_type: type_name,
                    value: literal.value.clone(),
                })
            }
        }
    }

    /// Identifiers resolve in a fixed order: query alias, measurement
    /// period, value set, code, code system, parameter, definition
    fn convert_identifier(&self, name: &str) -> Expression {
        let reference = Reference::new(name);
        let source = self.source;
        if self.aliases.iter().any(|a| a == name) {
            Expression::AliasRef(reference)
        } else if is_measurement_period(name) {
            Expression::ParameterRef(Reference {
                element: Element::typed("Interval<DateTime>"),
                ..reference
            })
        } else if source.valueset(name).is_some() {
            Expression::ValueSetRef(reference)
        } else if source.code(name).is_some() {
            Expression::CodeRef(reference)
        } else if source.codesystem(name).is_some() {
            Expression::CodeSystemRef(reference)
        } else if let Some(parameter) = source.parameter(name) {
            Expression::ParameterRef(Reference {
                element: Element {
                    locator: None,
                    result_type_name: parameter.data_type.as_deref().map(declared_type),
                },
                ..reference
            })
        } else if source.define(name).is_some() {
            Expression::ExpressionRef(Reference {
                element: Element {
                    locator: None,
                    result_type_name: self.def_types.get(name).cloned(),
                },
                ..reference
            })
        } else {
            Expression::IdentifierRef(reference)
        }
    }

    fn convert_member(&mut self, member: &ast::MemberAccess) -> Expression {
        if let Some(name) = member.object.as_identifier() {
            if self.aliases.iter().any(|a| a == name) {
                return Expression::Property(Property {
                    element: Element {
                        locator: None,
                        result_type_name: property_type(&member.member),
                    },
                    source: None,
                    path: member.member.clone(),
                    scope: Some(name.to_string()),
                });
            }
            if self.source.include(name).is_some() {
                return Expression::ExpressionRef(Reference {
                    element: Element::default(),
                    library_name: Some(name.to_string()),
                    name: member.member.clone(),
                });
            }
        }
        Expression::Property(Property {
            element: Element {
                locator: None,
                result_type_name: property_type(&member.member),
            },
            source: Some(Box::new(self.convert_expression(&member.object))),
            path: member.member.clone(),
            scope: None,
        })
    }

    fn convert_binary_op(&mut self, binary: &ast::BinaryExpr) -> Expression {
        let left = self.convert_expression(&binary.left);
        let right = self.convert_expression(&binary.right);
        let result_type = if binary.op.is_boolean() {
            Some(system_type("Boolean"))
        } else if binary.op.is_set_operation() || binary.op == BinaryOp::Concatenate {
            left.result_type_name().map(str::to_string)
        } else if binary.op == BinaryOp::Divide {
            Some(system_type("Decimal"))
        } else {
            // Arithmetic keeps the operand type; `date + 1 year` stays a date
            left.result_type_name()
                .or_else(|| right.result_type_name())
                .map(str::to_string)
        };
        let element = Element {
            locator: None,
            result_type_name: result_type,
        };
        Expression::binary_with(binary.op, element, left, right)
    }

    fn convert_unary_op(&mut self, unary: &ast::UnaryExpr) -> Expression {
        let operand = Box::new(self.convert_expression(&unary.operand));
        let boolean = Element::typed(system_type("Boolean"));
        let node = |element: Element, operand: Box<Expression>| UnaryExpression { element, operand };
        match unary.op {
            UnaryOp::Not => Expression::Not(node(boolean, operand)),
            UnaryOp::Exists => Expression::Exists(node(boolean, operand)),
            UnaryOp::IsNull => Expression::IsNull(node(boolean, operand)),
            UnaryOp::IsNotNull => Expression::Not(node(
                boolean.clone(),
                Box::new(Expression::IsNull(node(boolean, operand))),
            )),
            UnaryOp::Negate => {
                let element = Element {
                    locator: None,
                    result_type_name: operand.result_type_name().map(str::to_string),
                };
                Expression::Negate(node(element, operand))
            }
            UnaryOp::StartOf | UnaryOp::EndOf => {
                let element = Element {
                    locator: None,
                    result_type_name: operand.result_type_name().and_then(interval_point_type),
                };
                if unary.op == UnaryOp::StartOf {
                    Expression::Start(node(element, operand))
                } else {
                    Expression::End(node(element, operand))
                }
            }
        }
    }

    fn convert_retrieve(&mut self, reference: &ast::ResourceReference) -> Expression {
        let (code_property, code_comparator, codes) = match reference.code_filter.as_deref() {
            None => (None, None, None),
            Some(AstExpression::Binary(filter))
                if matches!(filter.op, BinaryOp::In | BinaryOp::Equal | BinaryOp::Equivalent)
                    && filter.left.as_identifier().is_some() =>
            {
                (
                    filter.left.as_identifier().map(str::to_string),
                    Some(filter.op.symbol().to_string()),
                    Some(Box::new(self.convert_code_target(&filter.right))),
                )
            }
            Some(filter) => (None, None, Some(Box::new(self.convert_code_target(filter)))),
        };
        Expression::Retrieve(Retrieve {
            element: Element::typed(format!("List<{}>", reference.resource_type)),
            data_type: reference.resource_type.clone(),
            code_property,
            code_comparator,
            codes,
        })
    }

    /// Terminology target of a code filter; names are looked up only
    /// among declared value sets and codes
    fn convert_code_target(&mut self, target: &AstExpression) -> Expression {
        match target {
            AstExpression::Identifier(id) if self.source.valueset(&id.name).is_some() => {
                Expression::ValueSetRef(Reference::new(&id.name))
            }
            AstExpression::Identifier(id) if self.source.code(&id.name).is_some() => {
                Expression::CodeRef(Reference::new(&id.name))
            }
            AstExpression::Identifier(id) => Expression::IdentifierRef(Reference::new(&id.name)),
            other => self.convert_expression(other),
        }
    }

    fn convert_query(&mut self, query: &ast::Query) -> Expression {
        let depth = self.aliases.len();
        let source = self.convert_query_source(&query.source, "query source");
        let result_type = source.result_type_name().map(str::to_string);
        if let Some(alias) = &query.alias {
            self.aliases.push(alias.clone());
        }

        let mut relationship = Vec::with_capacity(query.relationships.len());
        for clause in &query.relationships {
            relationship.push(self.convert_relationship(clause));
        }

        let where_clause = query
            .where_clause
            .as_deref()
            .map(|e| Box::new(self.convert_expression(e)));
        let return_clause = query.return_clause.as_deref().map(|e| ReturnClause {
            expression: Box::new(self.convert_expression(e)),
        });
        self.aliases.truncate(depth);

        let result_type = match &return_clause {
            Some(clause) => clause
                .expression
                .result_type_name()
                .map(|element| format!("List<{element}>")),
            None => result_type,
        };

        Expression::Query(Query {
            element: Element {
                locator: None,
                result_type_name: result_type,
            },
            source: vec![AliasedQuerySource {
                expression: Box::new(source),
                alias: query.alias.clone(),
            }],
            relationship,
            where_clause,
            return_clause,
        })
    }

    fn convert_relationship(&mut self, clause: &ast::RelationshipClause) -> RelationshipClause {
        let expression = Box::new(self.convert_query_source(&clause.source, "relationship source"));
        if let Some(alias) = &clause.alias {
            self.aliases.push(alias.clone());
        }
        let relationship = Relationship {
            expression,
            alias: clause.alias.clone(),
            such_that: clause
                .condition
                .as_deref()
                .map(|e| Box::new(self.convert_expression(e))),
        };
        match clause.kind {
            RelationshipKind::With => RelationshipClause::With(relationship),
            RelationshipKind::Without => RelationshipClause::Without(relationship),
        }
    }

    /// Sources must be a retrieve or a name; anything else lowers to null
    fn convert_query_source(&mut self, source: &AstExpression, what: &str) -> Expression {
        match source {
            AstExpression::ResourceReference(_) | AstExpression::Identifier(_) => {
                self.convert_expression(source)
            }
            other => self.unsupported(other, what),
        }
    }

    fn unsupported(&mut self, expr: &AstExpression, what: &str) -> Expression {
        let message = format!("cannot lower {} as {what}; using null", expr.kind_name());
        log::warn!("{message}");
        let diagnostic = Diagnostic::warning(CQL0203, message);
        self.diagnostics.push(match self.location {
            Some(location) => diagnostic.with_location(location),
            None => diagnostic,
        });
        Expression::null()
    }
}

const PRIMITIVE_TYPES: [&str; 8] = [
    "Boolean", "Integer", "Decimal", "String", "Date", "DateTime", "Time", "Quantity",
];

/// Declared parameter type; primitives get the system namespace
fn declared_type(data_type: &str) -> String {
    let compact: String = data_type.split_whitespace().collect();
    if PRIMITIVE_TYPES.contains(&compact.as_str()) {
        system_type(&compact)
    } else {
        compact
    }
}

/// Point type of `Interval<T>`
fn interval_point_type(interval: &str) -> Option<String> {
    let point = interval.strip_prefix("Interval<")?.strip_suffix('>')?;
    Some(declared_type(point))
}

/// Type of a clinical property, where the storage schema fixes it
fn property_type(path: &str) -> Option<String> {
    let name = match path {
        "period" => return Some("Interval<DateTime>".to_string()),
        "birthDate" => "Date",
        "effective" | "onset" | "abatement" | "performed" | "authoredOn" | "recordedDate"
        | "issued" | "deceased" | "start" | "end" => "DateTime",
        "value" => "Quantity",
        "id" | "status" | "gender" | "clinicalStatus" | "verificationStatus" | "intent"
        | "class" | "code" | "display" => "String",
        _ => return None,
    };
    Some(system_type(name))
}

/// Result type of a mapped library function
fn function_type(name: &str, first_operand: Option<&str>) -> Option<String> {
    let name = match name {
        "AgeInYears" | "AgeInYearsAt" | "AgeInMonths" | "AgeInMonthsAt" | "AgeInDays"
        | "AgeInDaysAt" | "CalculateAgeInYears" | "CalculateAgeInYearsAt" | "Count"
        | "Length" | "Year" | "Month" | "Day" | "DaysBetween" | "ToInteger" | "Truncate"
        | "Floor" | "Ceiling" => "Integer",
        "Avg" | "ToDecimal" | "Ln" | "Exp" | "Power" | "Sqrt" => "Decimal",
        "ToString" | "Upper" | "Lower" | "Substring" | "Concatenate" => "String",
        "StartsWith" | "EndsWith" => "Boolean",
        "Today" | "ToDate" | "DateFrom" => "Date",
        "Now" | "ToDateTime" => "DateTime",
        "Sum" | "Min" | "Max" | "Coalesce" | "Abs" | "Round" => {
            return first_operand.map(|t| {
                t.strip_prefix("List<")
                    .and_then(|inner| inner.strip_suffix('>'))
                    .unwrap_or(t)
                    .to_string()
            });
        }
        _ => return None,
    };
    Some(system_type(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cqlsql_ast::{Define, Literal as AstLiteral};

    fn library_with(expression: AstExpression) -> AstLibrary {
        AstLibrary {
            defines: vec![Define {
                name: "Test".to_string(),
                expression,
                context: Some("Patient".to_string()),
                location: SourceLocation::new(1, 1),
            }],
            ..AstLibrary::default()
        }
    }

    #[test]
    fn test_anonymous_library() {
        let lowered = lower(&library_with(AstExpression::literal(AstLiteral::boolean(true))));
        assert_eq!(lowered.library.identifier.id, "Anonymous");
        assert_eq!(lowered.library.statements[0].element.locator.as_deref(), Some("1:1"));
        assert!(lowered.diagnostics.is_empty());
    }

    #[test]
    fn test_unsupported_query_source_lowers_to_null() {
        let query = AstExpression::Query(Box::new(ast::Query {
            source: Box::new(AstExpression::literal(AstLiteral::integer("1"))),
            alias: Some("X".to_string()),
            relationships: Vec::new(),
            where_clause: None,
            return_clause: None,
        }));
        let lowered = lower(&library_with(query));
        match lowered.library.statements[0].expression.as_ref() {
            Expression::Query(q) => assert_eq!(*q.source[0].expression, Expression::null()),
            other => panic!("Expected query, got: {:?}", other),
        }
        assert_eq!(lowered.diagnostics[0].code, CQL0203);
    }
}
