//! Semantic checks over a parsed library
//!
//! - [`naming`]: advisory naming-convention linting
//! - [`references`]: classification of identifiers read during code generation

pub mod naming;
pub mod references;

pub use naming::{NameCategory, NamingReport, NamingRule, NamingViolation, lint};
pub use references::{
    BASE_RESOURCES, ReferenceKind, ReferenceResolver, ReferenceScope, Resolution, classify,
    is_builtin, is_measurement_period, strip_whitespace,
};
