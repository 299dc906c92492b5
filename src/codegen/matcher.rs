//! Structural compatibility of two attributes.
use crate::error::{ShapeMismatch, TransformError};
use crate::ir::{AttributeExpr, ShapeKind, TypeTable};

/// Two shapes are compatible when they share a category. Primitive kinds may
/// differ: numeric conversions are rendered as casts.
pub fn kinds_match(a: ShapeKind, b: ShapeKind) -> bool {
    matches!(
        (a, b),
        (ShapeKind::Primitive(_), ShapeKind::Primitive(_))
            | (ShapeKind::Object, ShapeKind::Object)
            | (ShapeKind::Array, ShapeKind::Array)
            | (ShapeKind::Map, ShapeKind::Map)
    )
}

pub fn compatible(
    types: &TypeTable,
    source: &AttributeExpr,
    target: &AttributeExpr,
    source_var: &str,
    target_var: &str,
    path: &str,
) -> Result<(), TransformError> {
    let source_shape = types.shape(source)?;
    let target_shape = types.shape(target)?;
    if kinds_match(source_shape, target_shape) {
        return Ok(());
    }
    Err(Box::new(ShapeMismatch {
        source_var: source_var.to_string(),
        source_shape,
        source_desc: types.describe(source),
        target_var: target_var.to_string(),
        target_shape,
        target_desc: types.describe(target),
        path: path.to_string(),
        after_wrap: false,
    }).into())
}

/// Mark a mismatch as one that survived a wrapping recovery.
pub fn after_wrap(err: TransformError) -> TransformError {
    match err {
        TransformError::ShapeMismatch(mut m) => {
            m.after_wrap = true;
            TransformError::ShapeMismatch(m)
        }
        other => other,
    }
}
