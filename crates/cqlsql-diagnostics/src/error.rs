//! Compile errors and non-fatal diagnostics

use crate::{CQL0401, ErrorCode, SourceLocation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Error - compilation cannot proceed
    Error,
    /// Warning - output was produced but degraded
    Warning,
    /// Information - informational message
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A non-fatal finding with optional location and help text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity level
    pub severity: Severity,
    /// Error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Source location
    pub location: Option<SourceLocation>,
    /// Additional context or help
    pub help: Option<String>,
}

impl Diagnostic {
    fn new(severity: Severity, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            location: None,
            help: None,
        }
    }

    /// Create a new error diagnostic
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Create a new warning diagnostic
    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    /// Create a new informational diagnostic
    pub fn info(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, message)
    }

    /// Set the location
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Set help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.severity, self.code, self.message)?;
        if let Some(loc) = &self.location {
            write!(f, " at {}", loc)?;
        }
        Ok(())
    }
}

/// Fatal compiler error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The token stream does not match the grammar
    #[error("{code}: expected {expected}, found {found} at line {}", .location.line)]
    Syntax {
        code: ErrorCode,
        expected: String,
        found: String,
        location: SourceLocation,
    },

    /// Invalid compiler options
    #[error("{code}: {message}")]
    Config { code: ErrorCode, message: String },
}

impl CompileError {
    /// Create a syntax error
    pub fn syntax(
        code: ErrorCode,
        expected: impl Into<String>,
        found: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Self::Syntax {
            code,
            expected: expected.into(),
            found: found.into(),
            location,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            code: CQL0401,
            message: message.into(),
        }
    }

    /// Get the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Syntax { code, .. } | Self::Config { code, .. } => *code,
        }
    }

    /// Source location, if the error has one
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Self::Syntax { location, .. } => Some(*location),
            Self::Config { .. } => None,
        }
    }

    /// Convert to a diagnostic for uniform reporting
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diagnostic = Diagnostic::error(self.code(), self.to_string());
        match self.location() {
            Some(location) => diagnostic.with_location(location),
            None => diagnostic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CQL0001, CQL0100};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_syntax_error_display() {
        let err = CompileError::syntax(CQL0001, "':'", "'define'", SourceLocation::new(3, 9));
        assert_eq!(err.to_string(), "CQL0001: expected ':', found 'define' at line 3");
        assert_eq!(err.location(), Some(SourceLocation::new(3, 9)));
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::warning(CQL0100, "Missing reference \"X\"")
            .with_location(SourceLocation::new(2, 5));
        assert_eq!(diag.to_string(), "warning: CQL0100 - Missing reference \"X\" at 2:5");
        assert!(diag.is_warning());
    }

    #[test]
    fn test_to_diagnostic_keeps_code() {
        let err = CompileError::config("bad period");
        let diag = err.to_diagnostic();
        assert!(diag.is_error());
        assert_eq!(diag.code, CQL0401);
        assert_eq!(diag.location, None);
    }
}
