//! Protobuf message wrapping.
//!
//! Messages cannot be arrays, maps or scalars, so such values travel inside a
//! synthetic message with a single `field` member. The engine uses
//! [`unwrap`] to see through that message when the two sides disagree.
use crate::ir::{AttributeExpr, DataType, TypeTable, TAG_RPC};

/// Logical name of the member of a wrapper message.
pub const WRAPPER_FIELD: &str = "field";

/// Structure of a wrapper message carrying `attr`.
pub fn wrapper_definition(attr: AttributeExpr) -> AttributeExpr {
    AttributeExpr::object([(WRAPPER_FIELD, attr.with_tag(TAG_RPC, "1"))])
}

/// Register a wrapper message named `name` carrying `attr`.
pub fn wrap(types: &mut TypeTable, name: &str, attr: AttributeExpr) -> AttributeExpr {
    types.user_type(name, wrapper_definition(attr))
}

/// The wrapped attribute when `attr` is a wrapper message.
pub fn unwrap<'a>(types: &'a TypeTable, attr: &'a AttributeExpr) -> Option<&'a AttributeExpr> {
    let resolved = types.resolve(attr).ok()?;
    let DataType::Object(object) = &resolved.ty else { return None };
    match object.fields.as_slice() {
        [only] if only.name == WRAPPER_FIELD => Some(&only.attribute),
        _ => None,
    }
}
