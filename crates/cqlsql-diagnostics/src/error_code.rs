//! Structured error codes
//!
//! Error code ranges:
//! - CQL0001-CQL0099: Syntax errors (fatal, raised by the parser)
//! - CQL0100-CQL0199: Semantic findings (references, naming conventions)
//! - CQL0200-CQL0299: Generation findings (unsupported shapes, unmapped functions)
//! - CQL0400-CQL0499: System errors (configuration)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Error code identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ErrorCode(u16);

impl ErrorCode {
    /// Create a new error code
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Get the numeric code
    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Get the static description for this code
    pub fn info(&self) -> &'static ErrorInfo {
        ERROR_INFO.get(&self.0).unwrap_or(&UNKNOWN_ERROR)
    }

    pub const fn is_syntax_error(&self) -> bool {
        self.0 >= 1 && self.0 < 100
    }

    pub const fn is_semantic(&self) -> bool {
        self.0 >= 100 && self.0 < 200
    }

    pub const fn is_generation(&self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    pub const fn is_system_error(&self) -> bool {
        self.0 >= 400 && self.0 < 500
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CQL{:04}", self.0)
    }
}

/// Information about an error code
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Short description of the error
    pub description: &'static str,
    /// Detailed help text
    pub help: Option<&'static str>,
}

impl ErrorInfo {
    const fn new(description: &'static str) -> Self {
        Self {
            description,
            help: None,
        }
    }

    const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

static UNKNOWN_ERROR: ErrorInfo = ErrorInfo::new("Unknown error");

static ERROR_INFO: LazyLock<HashMap<u16, ErrorInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Syntax errors (0001-0099)
    map.insert(1, ErrorInfo::new("Unexpected token"));
    map.insert(2, ErrorInfo::new("Unexpected end of input"));
    map.insert(3, ErrorInfo::new("Unrecognized character"));
    map.insert(10, ErrorInfo::new("Missing closing delimiter"));
    map.insert(12, ErrorInfo::new("Expected expression"));
    map.insert(13, ErrorInfo::new("Expected identifier"));
    map.insert(17, ErrorInfo::new("Invalid library definition"));
    map.insert(20, ErrorInfo::new("Invalid parameter definition"));
    map.insert(22, ErrorInfo::new("Invalid terminology definition"));
    map.insert(27, ErrorInfo::new("Invalid query expression"));
    map.insert(28, ErrorInfo::new("Invalid retrieve expression"));
    map.insert(29, ErrorInfo::new("Invalid interval expression"));

    // Semantic findings (0100-0199)
    map.insert(
        100,
        ErrorInfo::new("Missing reference")
            .with_help("Declare the definition before it is used, or load the library that provides it"),
    );
    map.insert(101, ErrorInfo::new("Reference to a later definition"));
    map.insert(103, ErrorInfo::new("Included library not loaded"));
    map.insert(109, ErrorInfo::new("Duplicate CTE name"));
    map.insert(
        120,
        ErrorInfo::new("Identifier is not PascalCase")
            .with_help("Start with an uppercase letter and use only letters and digits"),
    );
    map.insert(121, ErrorInfo::new("Generic definition name"));
    map.insert(122, ErrorInfo::new("Missing library declaration"));
    map.insert(123, ErrorInfo::new("No definitions"));

    // Generation findings (0200-0299)
    map.insert(200, ErrorInfo::new("Unsupported expression"));
    map.insert(201, ErrorInfo::new("Unmapped function"));
    map.insert(202, ErrorInfo::new("Undefined population"));
    map.insert(203, ErrorInfo::new("Unsupported lowering"));

    // System errors (0400-0499)
    map.insert(401, ErrorInfo::new("Invalid configuration"));
    map.insert(402, ErrorInfo::new("Invalid measurement period"));

    map
});

// Syntax
pub const CQL0001: ErrorCode = ErrorCode::new(1);
pub const CQL0002: ErrorCode = ErrorCode::new(2);
pub const CQL0003: ErrorCode = ErrorCode::new(3);
pub const CQL0010: ErrorCode = ErrorCode::new(10);
pub const CQL0012: ErrorCode = ErrorCode::new(12);
pub const CQL0013: ErrorCode = ErrorCode::new(13);
pub const CQL0017: ErrorCode = ErrorCode::new(17);
pub const CQL0020: ErrorCode = ErrorCode::new(20);
pub const CQL0022: ErrorCode = ErrorCode::new(22);
pub const CQL0027: ErrorCode = ErrorCode::new(27);
pub const CQL0028: ErrorCode = ErrorCode::new(28);
pub const CQL0029: ErrorCode = ErrorCode::new(29);

// Semantic
pub const CQL0100: ErrorCode = ErrorCode::new(100);
pub const CQL0101: ErrorCode = ErrorCode::new(101);
pub const CQL0103: ErrorCode = ErrorCode::new(103);
pub const CQL0109: ErrorCode = ErrorCode::new(109);
pub const CQL0120: ErrorCode = ErrorCode::new(120);
pub const CQL0121: ErrorCode = ErrorCode::new(121);
pub const CQL0122: ErrorCode = ErrorCode::new(122);
pub const CQL0123: ErrorCode = ErrorCode::new(123);

// Generation
pub const CQL0200: ErrorCode = ErrorCode::new(200);
pub const CQL0201: ErrorCode = ErrorCode::new(201);
pub const CQL0202: ErrorCode = ErrorCode::new(202);
pub const CQL0203: ErrorCode = ErrorCode::new(203);

// System
pub const CQL0401: ErrorCode = ErrorCode::new(401);
pub const CQL0402: ErrorCode = ErrorCode::new(402);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_zero_padded() {
        assert_eq!(CQL0001.to_string(), "CQL0001");
        assert_eq!(CQL0120.to_string(), "CQL0120");
    }

    #[test]
    fn test_ranges() {
        assert!(CQL0012.is_syntax_error());
        assert!(CQL0100.is_semantic());
        assert!(CQL0201.is_generation());
        assert!(CQL0402.is_system_error());
        assert!(!CQL0100.is_syntax_error());
    }

    #[test]
    fn test_info_lookup() {
        assert_eq!(CQL0100.info().description, "Missing reference");
        assert!(CQL0100.info().help.is_some());
        assert_eq!(ErrorCode::new(999).info().description, "Unknown error");
    }
}
