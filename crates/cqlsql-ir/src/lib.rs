//! Intermediate representation for measure logic
//!
//! The IR separates resource access ([`Retrieve`]) from filtering and
//! joining ([`Query`]), classifies every name as a definition, parameter,
//! terminology or alias reference, and annotates nodes with result types.
//! [`lower`] converts a parsed library and never fails.

pub mod lowering;
pub mod model;

pub use lowering::{AstToIrConverter, Lowered, lower};
pub use model::*;
