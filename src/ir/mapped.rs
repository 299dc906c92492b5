//! Read-only view over an object that maps logical (design) field names to the
//! physical names used by the generated structs.
//!
//! Field keys may use the `logical:physical` syntax. The physical name is,
//! in order of precedence: the part after `:`, the attribute's `field_alias`,
//! its `origin_attribute`, and finally the logical name itself.
use std::collections::BTreeSet;

use super::{AttributeExpr, DataType, Literal, TypeTable};
use crate::codegen::{naming, Representation};
use crate::error::TransformError;

#[derive(Debug, Clone)]
pub struct MappedField<'a> {
    pub logical: &'a str,
    pub physical: &'a str,
    pub attribute: &'a AttributeExpr,
}

#[derive(Debug, Clone)]
pub struct MappedAttributeExpr<'a> {
    fields: Vec<MappedField<'a>>,
    required: BTreeSet<&'a str>,
}

/// Split `logical:physical` into its parts.
pub fn split_name(name: &str) -> (&str, Option<&str>) {
    match name.split_once(':') {
        Some((logical, physical)) if !physical.is_empty() => (logical, Some(physical)),
        Some((logical, _)) => (logical, None),
        None => (name, None),
    }
}

impl<'a> MappedAttributeExpr<'a> {
    /// Build the view for an object attribute, looking through user types.
    /// Required sets declared on every link of a user type chain are merged.
    pub fn new(types: &'a TypeTable, attr: &'a AttributeExpr) -> Result<Self, TransformError> {
        let mut required: BTreeSet<&'a str> = attr.required.iter().map(String::as_str).collect();
        let mut current = attr;
        for _ in 0..=types.len() {
            let DataType::UserType(id) = current.ty else { break };
            current = types.definition(id)?;
            required.extend(current.required.iter().map(String::as_str));
        }
        if current.user_type_id().is_some() {
            return Err(TransformError::UnresolvedType { name: types.describe(attr) });
        }
        let object = match &current.ty {
            DataType::Object(o) => o,
            _ => {
                return Err(TransformError::NotAnObject { shape: types.describe(attr) });
            }
        };
        let fields = object.fields.iter().map(|f| {
            let (logical, physical) = split_name(&f.name);
            let physical = physical
                .or(f.attribute.field_alias.as_deref())
                .or(f.attribute.origin_attribute.as_deref())
                .unwrap_or(logical);
            MappedField { logical, physical, attribute: &f.attribute }
        }).collect();
        Ok(Self { fields, required })
    }

    pub fn fields(&self) -> &[MappedField<'a>] {
        &self.fields
    }

    pub fn find(&self, logical: &str) -> Option<&MappedField<'a>> {
        self.fields.iter().find(|f| f.logical == logical)
    }

    pub fn attribute(&self, logical: &str) -> Option<&'a AttributeExpr> {
        self.find(logical).map(|f| f.attribute)
    }

    /// Generated field identifier for the given representation.
    pub fn field_name_for(&self, logical: &str, repr: Representation) -> String {
        let physical = self.find(logical).map(|f| f.physical).unwrap_or(logical);
        naming::field_name(physical, repr)
    }

    pub fn is_required(&self, logical: &str) -> bool {
        self.required.contains(logical)
    }

    pub fn has_default(&self, logical: &str) -> bool {
        self.default_value(logical).is_some()
    }

    pub fn default_value(&self, logical: &str) -> Option<&'a Literal> {
        self.attribute(logical).and_then(|a| a.default_value.as_ref())
    }

    /// Whether the generated field for `logical` is a pointer to a primitive.
    ///
    /// Non-required primitives are pointers unless they carry a default value
    /// and `use_default` is set. Bytes and any are never pointers.
    pub fn is_primitive_pointer(&self, types: &TypeTable, logical: &str, use_default: bool) -> bool {
        let Some(attr) = self.attribute(logical) else { return false };
        match types.primitive_kind(attr) {
            Some(kind) => {
                kind.pointer_capable()
                    && !self.is_required(logical)
                    && (!self.has_default(logical) || !use_default)
            }
            None => false,
        }
    }
}
