//! Deduplicated store of generated helper functions.
//!
//! A helper's name is reserved before its body is built, so a type that
//! refers to itself finds its own helper already registered and emits a call
//! instead of recursing forever.
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::trace;

use super::Direction;
use crate::error::TransformError;
use crate::ir::{AttributeExpr, DataType, TypeTable};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// A generated conversion function `func name(v P) R`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HelperDescriptor {
    pub name: String,
    pub param_type_ref: String,
    pub result_type_ref: String,
    /// Function body without the trailing `return res`.
    pub code: String,
}

/// Identity of the conversion a helper performs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HelperKey {
    pub source: String,
    pub target: String,
    pub direction: Direction,
}

#[derive(Debug, Clone)]
struct Slot {
    key: HelperKey,
    /// `None` while the body is being built.
    descriptor: Option<HelperDescriptor>,
}

#[derive(Debug, Clone, Default)]
pub struct HelperRegistry {
    slots: IndexMap<String, Slot>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl HelperDescriptor {
    /// Full Go function declaration.
    pub fn render(&self) -> String {
        let mut out = format!(
            "func {}(v {}) {} {{\n",
            self.name, self.param_type_ref, self.result_type_ref
        );
        for line in self.code.lines() {
            if !line.is_empty() {
                out.push('\t');
                out.push_str(line);
            }
            out.push('\n');
        }
        out.push_str("\treturn res\n}\n");
        out
    }
}

fn identity(types: &TypeTable, attr: &AttributeExpr) -> String {
    match &attr.ty {
        DataType::UserType(id) => format!("{}#{}", types.name(*id), id.0),
        _ => types.describe(attr),
    }
}

impl HelperKey {
    pub fn new(types: &TypeTable, source: &AttributeExpr, target: &AttributeExpr, direction: Direction) -> Self {
        Self {
            source: identity(types, source),
            target: identity(types, target),
            direction,
        }
    }
}

impl fmt::Display for HelperKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.source, self.target, self.direction)
    }
}

impl HelperRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.slots.len() }

    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&HelperDescriptor> {
        self.slots.get(name).and_then(|s| s.descriptor.as_ref())
    }

    /// Ensure a helper named `name` exists for `key`, building it on first use.
    ///
    /// `build` receives the registry so the body can register further helpers.
    /// A name already taken by a different key is an error.
    pub fn get_or_create<F>(&mut self, key: HelperKey, name: &str, build: F) -> Result<(), TransformError>
    where
        F: FnOnce(&mut HelperRegistry) -> Result<HelperDescriptor, TransformError>,
    {
        if let Some(slot) = self.slots.get(name) {
            if slot.key == key {
                return Ok(());
            }
            return Err(TransformError::AmbiguousHelper {
                name: name.to_string(),
                existing: slot.key.to_string(),
                requested: key.to_string(),
            });
        }
        trace!(helper = name, %key, "reserving helper");
        self.slots.insert(name.to_string(), Slot { key, descriptor: None });
        match build(self) {
            Ok(descriptor) => {
                if let Some(slot) = self.slots.get_mut(name) {
                    slot.descriptor = Some(descriptor);
                }
                Ok(())
            }
            Err(err) => {
                self.slots.shift_remove(name);
                Err(err)
            }
        }
    }

    /// Completed helpers in registration order.
    pub fn helpers(&self) -> impl Iterator<Item = &HelperDescriptor> {
        self.slots.values().filter_map(|s| s.descriptor.as_ref())
    }

    pub fn into_helpers(self) -> Vec<HelperDescriptor> {
        self.slots.into_values().filter_map(|s| s.descriptor).collect()
    }

    /// Fold another registry in, keeping the first helper of each name.
    pub fn merge(&mut self, other: HelperRegistry) -> Result<(), TransformError> {
        for (name, slot) in other.slots {
            match self.slots.get(&name) {
                Some(existing) if existing.key != slot.key => {
                    return Err(TransformError::AmbiguousHelper {
                        name,
                        existing: existing.key.to_string(),
                        requested: slot.key.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    self.slots.insert(name, slot);
                }
            }
        }
        Ok(())
    }
}

/// Append helpers whose names are not in `existing` yet.
pub fn append_helpers(
    mut existing: Vec<HelperDescriptor>,
    new: impl IntoIterator<Item = HelperDescriptor>,
) -> Vec<HelperDescriptor> {
    for helper in new {
        if !existing.iter().any(|h| h.name == helper.name) {
            existing.push(helper);
        }
    }
    existing
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
