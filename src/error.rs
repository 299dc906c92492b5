//! Error types for the engine and the design loader.
use thiserror::Error;

use crate::ir::ShapeKind;

/// Source and target shapes cannot be converted into one another.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{source_var} is {source_shape} but {target_var} is {target_shape} (at `{path}`){}", wrap_note(.after_wrap))]
pub struct ShapeMismatch {
    pub source_var: String,
    pub source_shape: ShapeKind,
    pub source_desc: String,
    pub target_var: String,
    pub target_shape: ShapeKind,
    pub target_desc: String,
    /// Design-level field path, e.g. `items[*].owner`.
    pub path: String,
    /// The mismatch survived a wrapping recovery at the same site.
    pub after_wrap: bool,
}

fn wrap_note(after_wrap: &bool) -> &'static str {
    if *after_wrap { " after unwrapping the message field" } else { "" }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error(transparent)]
    ShapeMismatch(#[from] Box<ShapeMismatch>),

    #[error("helper name {name} derived for both {existing} and {requested}")]
    AmbiguousHelper {
        name: String,
        existing: String,
        requested: String,
    },

    #[error("user type {name} has no structural definition")]
    UnresolvedType { name: String },

    #[error("{shape} is not an object")]
    NotAnObject { shape: String },
}

impl TransformError {
    pub fn as_shape_mismatch(&self) -> Option<&ShapeMismatch> {
        match self {
            TransformError::ShapeMismatch(m) => Some(m),
            _ => None,
        }
    }
}

/// Problems found while loading a design document.
#[derive(Error, Debug)]
pub enum DesignError {
    #[error("at JSON path {path} → {message}")]
    Parse { path: String, message: String },

    #[error("unknown type `{name}` referenced at {context}")]
    UnknownType { name: String, context: String },

    #[error("request `{0}` is declared more than once")]
    DuplicateRequest(String),

    #[error("type name `{0}` collides with a primitive type")]
    ReservedName(String),

    #[error("attribute at {context} must have exactly one of `type`, `object`, `array`, `map` or `wrap`")]
    AmbiguousShape { context: String },

    #[error("invalid field key `{key}` at {context}")]
    InvalidFieldKey { key: String, context: String },

    #[error("default value at {context} does not fit {expected}")]
    InvalidDefault { context: String, expected: String },

    #[error("required field `{name}` is not declared at {context}")]
    UnknownRequired { name: String, context: String },

    #[error("`wrap` at {context} is only allowed as a whole type definition")]
    MisplacedWrap { context: String },
}
