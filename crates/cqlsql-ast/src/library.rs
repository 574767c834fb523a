//! Library structure AST nodes

use crate::Expression;
use cqlsql_diagnostics::SourceLocation;

/// A complete library document
///
/// `defines` keeps declaration order; later definitions may refer to
/// earlier ones but not the other way round.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Library {
    /// Library name from the `library` header
    pub identifier: Option<String>,
    /// Version from the `library` header
    pub version: Option<String>,
    /// Location of the `library` header
    pub location: Option<SourceLocation>,
    /// Using definitions (data models)
    pub usings: Vec<UsingDefinition>,
    /// Include definitions (library includes)
    pub includes: Vec<IncludeDefinition>,
    pub codesystems: Vec<CodesystemDefinition>,
    pub valuesets: Vec<ValuesetDefinition>,
    pub codes: Vec<CodeDefinition>,
    pub parameters: Vec<Parameter>,
    /// Named expression definitions in declaration order
    pub defines: Vec<Define>,
}

impl Library {
    /// Create a new empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a definition by its declared name
    pub fn define(&self, name: &str) -> Option<&Define> {
        self.defines.iter().find(|d| d.name == name)
    }

    pub fn valueset(&self, name: &str) -> Option<&ValuesetDefinition> {
        self.valuesets.iter().find(|v| v.name == name)
    }

    pub fn codesystem(&self, name: &str) -> Option<&CodesystemDefinition> {
        self.codesystems.iter().find(|c| c.name == name)
    }

    pub fn code(&self, name: &str) -> Option<&CodeDefinition> {
        self.codes.iter().find(|c| c.name == name)
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Include whose `called` alias (or library name) matches
    pub fn include(&self, alias: &str) -> Option<&IncludeDefinition> {
        self.includes.iter().find(|i| i.local_name() == alias)
    }
}

/// Using definition for a data model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsingDefinition {
    /// Model identifier (e.g., "FHIR")
    pub model: String,
    pub version: Option<String>,
}

/// Include definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDefinition {
    pub library: String,
    pub version: Option<String>,
    /// `called` alias
    pub alias: Option<String>,
}

impl IncludeDefinition {
    /// Name used to qualify references into the library
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.library)
    }
}

/// Codesystem definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodesystemDefinition {
    pub name: String,
    pub uri: String,
    pub version: Option<String>,
    pub location: SourceLocation,
}

/// Valueset definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuesetDefinition {
    pub name: String,
    pub uri: String,
    pub location: SourceLocation,
}

/// Code definition: `code "Name": 'value' from "System" display 'text'`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeDefinition {
    pub name: String,
    pub code: String,
    /// Name of the declaring codesystem
    pub system: String,
    pub display: Option<String>,
    pub location: SourceLocation,
}

/// Parameter definition
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    /// Type tokens joined by single spaces; never interpreted
    pub data_type: Option<String>,
    pub default: Option<Expression>,
    pub location: SourceLocation,
}

/// Named expression definition
#[derive(Debug, Clone, PartialEq)]
pub struct Define {
    pub name: String,
    pub expression: Expression,
    /// Context in effect when the definition was declared
    pub context: Option<String>,
    pub location: SourceLocation,
}
