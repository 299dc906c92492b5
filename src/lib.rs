//! Schema-directed conversion code generator.
//!
//! Given two structural type descriptions, emits Go code converting a value of
//! the source shape into a value of the target shape, together with the helper
//! functions needed for nested and recursive user types.
pub mod codegen;
pub mod design;
pub mod error;
pub mod ir;
mod path_de;

pub use codegen::{collect_helpers, transform, transform_with, Direction, Request, Transform};
pub use design::Design;
pub use error::{DesignError, TransformError};
