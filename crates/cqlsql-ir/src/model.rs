//! IR model types
//!
//! The IR follows the shape of HL7 ELM: every node is tagged with its
//! `type`, fields are camelCase, and each expression carries an
//! [`Element`] with an optional locator and result type name. Resource
//! access is an explicit [`Retrieve`]; filtering and joining is a
//! [`Query`] with a single aliased source.

use cqlsql_ast::{BinaryOp, DurationUnit, OffsetBound, TimingDirection};
use cqlsql_diagnostics::SourceLocation;
use serde::{Deserialize, Serialize};

/// Namespace of the system types used in `valueType` and `resultTypeName`
pub const SYSTEM_TYPES: &str = "urn:hl7-org:elm-types:r1";

/// Qualified system type name, `{urn:hl7-org:elm-types:r1}Name`
pub fn system_type(name: &str) -> String {
    format!("{{{SYSTEM_TYPES}}}{name}")
}

/// Source location from a `line:column` locator
pub fn parse_locator(locator: &str) -> Option<SourceLocation> {
    let (line, column) = locator.split_once(':')?;
    Some(SourceLocation::new(line.parse().ok()?, column.parse().ok()?))
}

/// Local part of a qualified type name
pub fn local_type_name(qualified: &str) -> &str {
    qualified
        .rsplit_once('}')
        .map_or(qualified, |(_, local)| local)
}

// ============================================================================
// Library
// ============================================================================

/// A lowered library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    pub identifier: VersionedIdentifier,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub usings: Vec<UsingDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<IncludeDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code_systems: Vec<CodeSystemDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value_sets: Vec<ValueSetDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub codes: Vec<CodeDef>,
    /// Expression definitions in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statements: Vec<ExpressionDef>,
}

impl Library {
    pub fn new(id: impl Into<String>, version: Option<String>) -> Self {
        Self {
            identifier: VersionedIdentifier {
                id: id.into(),
                version,
            },
            usings: Vec::new(),
            includes: Vec::new(),
            parameters: Vec::new(),
            code_systems: Vec::new(),
            value_sets: Vec::new(),
            codes: Vec::new(),
            statements: Vec::new(),
        }
    }

    pub fn statement(&self, name: &str) -> Option<&ExpressionDef> {
        self.statements.iter().find(|s| s.name == name)
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDef> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn value_set(&self, name: &str) -> Option<&ValueSetDef> {
        self.value_sets.iter().find(|v| v.name == name)
    }

    pub fn code_system(&self, name: &str) -> Option<&CodeSystemDef> {
        self.code_systems.iter().find(|c| c.name == name)
    }

    pub fn code(&self, name: &str) -> Option<&CodeDef> {
        self.codes.iter().find(|c| c.name == name)
    }

    /// Serialize as JSON
    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

/// Library name and version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedIdentifier {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsingDef {
    pub local_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludeDef {
    /// Name used to qualify references (`called` alias)
    pub local_identifier: String,
    /// Included library name
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDef {
    pub name: String,
    /// Declared type tokens, kept opaque
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter_type_name: Option<String>,
    #[serde(rename = "default", skip_serializing_if = "Option::is_none")]
    pub default_expr: Option<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSystemDef {
    pub name: String,
    /// Code system URI
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueSetDef {
    pub name: String,
    /// Value set URI
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeDef {
    pub name: String,
    /// Code value
    pub id: String,
    /// Name of the declaring code system
    pub code_system: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// Named expression definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionDef {
    #[serde(flatten)]
    pub element: Element,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub expression: Box<Expression>,
}

// ============================================================================
// Expressions
// ============================================================================

/// Common node metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    /// Source position, `line:column`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_type_name: Option<String>,
}

impl Element {
    pub fn typed(result_type_name: impl Into<String>) -> Self {
        Self {
            locator: None,
            result_type_name: Some(result_type_name.into()),
        }
    }
}

/// IR expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expression {
    // === Literals ===
    Null(NullLiteral),
    Literal(Literal),
    Quantity(Quantity),

    // === References ===
    ExpressionRef(Reference),
    ParameterRef(Reference),
    ValueSetRef(Reference),
    CodeSystemRef(Reference),
    CodeRef(Reference),
    AliasRef(Reference),
    /// Name that is neither declared nor bound; built-in or unresolved
    IdentifierRef(Reference),
    Property(Property),
    FunctionRef(FunctionRef),

    // === Logical ===
    And(BinaryExpression),
    Or(BinaryExpression),
    Not(UnaryExpression),

    // === Comparison ===
    Equal(BinaryExpression),
    NotEqual(BinaryExpression),
    Equivalent(BinaryExpression),
    Less(BinaryExpression),
    Greater(BinaryExpression),
    LessOrEqual(BinaryExpression),
    GreaterOrEqual(BinaryExpression),
    IsNull(UnaryExpression),

    // === Arithmetic and strings ===
    Add(BinaryExpression),
    Subtract(BinaryExpression),
    Multiply(BinaryExpression),
    Divide(BinaryExpression),
    Negate(UnaryExpression),
    Concatenate(BinaryExpression),

    // === Intervals and timing ===
    Interval(IntervalExpression),
    Start(UnaryExpression),
    End(UnaryExpression),
    In(BinaryExpression),
    During(BinaryExpression),
    Before(BinaryExpression),
    After(BinaryExpression),
    SameOrBefore(BinaryExpression),
    SameOrAfter(BinaryExpression),
    Overlaps(BinaryExpression),
    Starts(BinaryExpression),
    Ends(BinaryExpression),
    Timing(TimingExpression),

    // === Lists ===
    Exists(UnaryExpression),
    Union(BinaryExpression),
    Except(BinaryExpression),
    Intersect(BinaryExpression),

    // === Data access ===
    Retrieve(Retrieve),
    Query(Query),
}

impl Expression {
    pub fn null() -> Self {
        Self::Null(NullLiteral::default())
    }

    /// Build the binary node for `op`
    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Self::binary_with(op, Element::default(), left, right)
    }

    pub fn binary_with(op: BinaryOp, element: Element, left: Expression, right: Expression) -> Self {
        let node = BinaryExpression {
            element,
            operand: vec![Box::new(left), Box::new(right)],
        };
        match op {
            BinaryOp::Or => Self::Or(node),
            BinaryOp::And => Self::And(node),
            BinaryOp::Equal => Self::Equal(node),
            BinaryOp::NotEqual => Self::NotEqual(node),
            BinaryOp::Equivalent => Self::Equivalent(node),
            BinaryOp::Less => Self::Less(node),
            BinaryOp::Greater => Self::Greater(node),
            BinaryOp::LessOrEqual => Self::LessOrEqual(node),
            BinaryOp::GreaterOrEqual => Self::GreaterOrEqual(node),
            BinaryOp::In => Self::In(node),
            BinaryOp::During => Self::During(node),
            BinaryOp::Before => Self::Before(node),
            BinaryOp::After => Self::After(node),
            BinaryOp::OnOrBefore => Self::SameOrBefore(node),
            BinaryOp::OnOrAfter => Self::SameOrAfter(node),
            BinaryOp::Overlaps => Self::Overlaps(node),
            BinaryOp::Starts => Self::Starts(node),
            BinaryOp::Ends => Self::Ends(node),
            BinaryOp::Add => Self::Add(node),
            BinaryOp::Subtract => Self::Subtract(node),
            BinaryOp::Concatenate => Self::Concatenate(node),
            BinaryOp::Union => Self::Union(node),
            BinaryOp::Except => Self::Except(node),
            BinaryOp::Intersect => Self::Intersect(node),
            BinaryOp::Multiply => Self::Multiply(node),
            BinaryOp::Divide => Self::Divide(node),
        }
    }

    /// Operator and operands of a binary node
    pub fn as_binary(&self) -> Option<(BinaryOp, &BinaryExpression)> {
        let (op, node) = match self {
            Self::Or(n) => (BinaryOp::Or, n),
            Self::And(n) => (BinaryOp::And, n),
            Self::Equal(n) => (BinaryOp::Equal, n),
            Self::NotEqual(n) => (BinaryOp::NotEqual, n),
            Self::Equivalent(n) => (BinaryOp::Equivalent, n),
            Self::Less(n) => (BinaryOp::Less, n),
            Self::Greater(n) => (BinaryOp::Greater, n),
            Self::LessOrEqual(n) => (BinaryOp::LessOrEqual, n),
            Self::GreaterOrEqual(n) => (BinaryOp::GreaterOrEqual, n),
            Self::In(n) => (BinaryOp::In, n),
            Self::During(n) => (BinaryOp::During, n),
            Self::Before(n) => (BinaryOp::Before, n),
            Self::After(n) => (BinaryOp::After, n),
            Self::SameOrBefore(n) => (BinaryOp::OnOrBefore, n),
            Self::SameOrAfter(n) => (BinaryOp::OnOrAfter, n),
            Self::Overlaps(n) => (BinaryOp::Overlaps, n),
            Self::Starts(n) => (BinaryOp::Starts, n),
            Self::Ends(n) => (BinaryOp::Ends, n),
            Self::Add(n) => (BinaryOp::Add, n),
            Self::Subtract(n) => (BinaryOp::Subtract, n),
            Self::Concatenate(n) => (BinaryOp::Concatenate, n),
            Self::Union(n) => (BinaryOp::Union, n),
            Self::Except(n) => (BinaryOp::Except, n),
            Self::Intersect(n) => (BinaryOp::Intersect, n),
            Self::Multiply(n) => (BinaryOp::Multiply, n),
            Self::Divide(n) => (BinaryOp::Divide, n),
            _ => return None,
        };
        Some((op, node))
    }

    /// Name carried by a reference node
    pub fn reference_name(&self) -> Option<&str> {
        match self {
            Self::ExpressionRef(r)
            | Self::ParameterRef(r)
            | Self::ValueSetRef(r)
            | Self::CodeSystemRef(r)
            | Self::CodeRef(r)
            | Self::AliasRef(r)
            | Self::IdentifierRef(r) => Some(&r.name),
            _ => None,
        }
    }

    pub fn element(&self) -> &Element {
        match self {
            Self::Null(n) => &n.element,
            Self::Literal(n) => &n.element,
            Self::Quantity(n) => &n.element,
            Self::ExpressionRef(n)
            | Self::ParameterRef(n)
            | Self::ValueSetRef(n)
            | Self::CodeSystemRef(n)
            | Self::CodeRef(n)
            | Self::AliasRef(n)
            | Self::IdentifierRef(n) => &n.element,
            Self::Property(n) => &n.element,
            Self::FunctionRef(n) => &n.element,
            Self::Not(n)
            | Self::IsNull(n)
            | Self::Negate(n)
            | Self::Start(n)
            | Self::End(n)
            | Self::Exists(n) => &n.element,
            Self::Interval(n) => &n.element,
            Self::Timing(n) => &n.element,
            Self::Retrieve(n) => &n.element,
            Self::Query(n) => &n.element,
            Self::Or(n)
            | Self::And(n)
            | Self::Equal(n)
            | Self::NotEqual(n)
            | Self::Equivalent(n)
            | Self::Less(n)
            | Self::Greater(n)
            | Self::LessOrEqual(n)
            | Self::GreaterOrEqual(n)
            | Self::In(n)
            | Self::During(n)
            | Self::Before(n)
            | Self::After(n)
            | Self::SameOrBefore(n)
            | Self::SameOrAfter(n)
            | Self::Overlaps(n)
            | Self::Starts(n)
            | Self::Ends(n)
            | Self::Add(n)
            | Self::Subtract(n)
            | Self::Concatenate(n)
            | Self::Union(n)
            | Self::Except(n)
            | Self::Intersect(n)
            | Self::Multiply(n)
            | Self::Divide(n) => &n.element,
        }
    }

    /// Annotated result type, if known
    pub fn result_type_name(&self) -> Option<&str> {
        self.element().result_type_name.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullLiteral {
    #[serde(flatten)]
    pub element: Element,
}

/// Literal with its source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Literal {
    #[serde(flatten)]
    pub element: Element,
    /// Qualified system type, e.g. `{urn:hl7-org:elm-types:r1}Integer`
    pub value_type: String,
    pub value: String,
}

impl Literal {
    /// Local name of the value type (`Integer`, `String`, ...)
    pub fn type_name(&self) -> &str {
        local_type_name(&self.value_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity {
    #[serde(flatten)]
    pub element: Element,
    pub value: String,
    pub unit: String,
}

/// Reference to a named thing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    #[serde(flatten)]
    pub element: Element,
    /// Included library that declares the name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
    pub name: String,
}

impl Reference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            element: Element::default(),
            library_name: None,
            name: name.into(),
        }
    }

    /// `Library.Name` for qualified references, the name otherwise
    pub fn qualified_name(&self) -> String {
        match &self.library_name {
            Some(library) => format!("{library}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Property access, either on an alias (`scope`) or on a source expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(flatten)]
    pub element: Element,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Box<Expression>>,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionRef {
    #[serde(flatten)]
    pub element: Element,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_name: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operand: Vec<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpression {
    #[serde(flatten)]
    pub element: Element,
    pub operand: Box<Expression>,
}

/// Two-operand node; `operand` always holds exactly two entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpression {
    #[serde(flatten)]
    pub element: Element,
    pub operand: Vec<Box<Expression>>,
}

impl BinaryExpression {
    pub fn left(&self) -> &Expression {
        &self.operand[0]
    }

    pub fn right(&self) -> &Expression {
        &self.operand[1]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalExpression {
    #[serde(flatten)]
    pub element: Element,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Box<Expression>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Box<Expression>>,
    pub low_closed: bool,
    pub high_closed: bool,
}

/// Duration-bounded comparison: `operand[0]` is `value unit` before or
/// after `operand[1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingExpression {
    #[serde(flatten)]
    pub element: Element,
    pub operand: Vec<Box<Expression>>,
    pub value: String,
    pub unit: DurationUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound: Option<OffsetBound>,
    pub direction: TimingDirection,
}

/// Resource access with an optional terminology filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Retrieve {
    #[serde(flatten)]
    pub element: Element,
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_property: Option<String>,
    /// `in`, `=` or `~` when the filter names its property
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_comparator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codes: Option<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(flatten)]
    pub element: Element,
    /// Exactly one source
    pub source: Vec<AliasedQuerySource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationship: Vec<RelationshipClause>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<Box<Expression>>,
    #[serde(rename = "return", skip_serializing_if = "Option::is_none")]
    pub return_clause: Option<ReturnClause>,
}

impl Query {
    /// The single source slot
    pub fn primary_source(&self) -> Option<&AliasedQuerySource> {
        self.source.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasedQuerySource {
    pub expression: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelationshipClause {
    With(Relationship),
    Without(Relationship),
}

impl RelationshipClause {
    pub fn relationship(&self) -> &Relationship {
        match self {
            Self::With(r) | Self::Without(r) => r,
        }
    }

    pub fn is_without(&self) -> bool {
        matches!(self, Self::Without(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub expression: Box<Expression>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub such_that: Option<Box<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnClause {
    pub expression: Box<Expression>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_locator() {
        assert_eq!(parse_locator("12:3"), Some(SourceLocation::new(12, 3)));
        assert_eq!(parse_locator("x:3"), None);
        assert_eq!(parse_locator("12"), None);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(system_type("Boolean"), "{urn:hl7-org:elm-types:r1}Boolean");
        assert_eq!(local_type_name("{urn:hl7-org:elm-types:r1}Boolean"), "Boolean");
        assert_eq!(local_type_name("List<Condition>"), "List<Condition>");
    }

    #[test]
    fn test_binary_round_trips_operator() {
        let node = Expression::binary(BinaryOp::OnOrBefore, Expression::null(), Expression::null());
        assert!(matches!(node, Expression::SameOrBefore(_)));
        let (op, operands) = node.as_binary().unwrap();
        assert_eq!(op, BinaryOp::OnOrBefore);
        assert_eq!(operands.operand.len(), 2);
    }

    #[test]
    fn test_serializes_with_type_tag() {
        let expr = Expression::ExpressionRef(Reference::new("Adults"));
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(json, serde_json::json!({"type": "ExpressionRef", "name": "Adults"}));
    }

    #[test]
    fn test_qualified_reference_name() {
        let mut reference = Reference::new("Adults");
        reference.library_name = Some("Common".to_string());
        assert_eq!(reference.qualified_name(), "Common.Adults");
    }
}
