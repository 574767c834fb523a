//! Diagnostics and error handling for the CQL-to-SQL compiler
//!
//! Syntax errors are fatal and returned as [`CompileError`]. Everything found
//! after parsing (naming findings, missing references, degraded code
//! generation) is reported as a [`Diagnostic`] alongside the output.

mod error;
mod error_code;
mod location;

pub use error::*;
pub use error_code::*;
pub use location::*;

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;
