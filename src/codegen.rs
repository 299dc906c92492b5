//! Code generation for conversions between two shapes.
//!
//! The entry points are [`transform`], which renders the statements converting
//! one variable into another together with the helper functions they call, and
//! [`collect_helpers`], which only produces the helpers.
pub mod matcher;
pub mod naming;
pub mod policy;
pub mod registry;
pub mod transform;
pub mod wrap;

use serde::{Deserialize, Serialize};

use crate::error::TransformError;
use crate::ir::{AttributeExpr, TypeTable};

pub use registry::{append_helpers, HelperDescriptor, HelperKey, HelperRegistry};
pub use transform::Engine;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Service types into transport types.
    Marshal,
    /// Transport types into service types.
    Unmarshal,
    /// Service types into protobuf messages.
    ToProto,
    /// Protobuf messages into service types.
    FromProto,
}

/// How a type is laid out in generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Representation {
    /// Hand-shaped structs: optional primitives are pointers, idiomatic casing.
    Service,
    /// protoc generated structs: no primitive pointers, `int` is 32 bits.
    ProtoBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Target,
}

/// Inputs of one top-level conversion.
#[derive(Debug, Clone)]
pub struct Request<'a> {
    pub source: &'a AttributeExpr,
    pub target: &'a AttributeExpr,
    pub source_var: &'a str,
    pub target_var: &'a str,
    pub source_pkg: &'a str,
    pub target_pkg: &'a str,
    pub direction: Direction,
    /// `:=` when set, `=` otherwise.
    pub declare_new: bool,
}

/// Output of [`transform`]: the conversion statements and every helper they call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transform {
    pub code: String,
    pub helpers: Vec<HelperDescriptor>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Direction {
    pub const ALL: [Direction; 4] = [Self::Marshal, Self::Unmarshal, Self::ToProto, Self::FromProto];

    pub fn source_repr(self) -> Representation {
        match self {
            Self::FromProto => Representation::ProtoBuf,
            _ => Representation::Service,
        }
    }

    pub fn target_repr(self) -> Representation {
        match self {
            Self::ToProto => Representation::ProtoBuf,
            _ => Representation::Service,
        }
    }

    /// The side whose shape may differ structurally from the design (message wrapping).
    pub fn rigid_side(self) -> Option<Side> {
        match self {
            Self::ToProto => Some(Side::Target),
            Self::FromProto => Some(Side::Source),
            Self::Marshal | Self::Unmarshal => None,
        }
    }

    /// The side that drives dispatch: the one holding service types.
    pub fn service_side(self) -> Side {
        match self {
            Self::FromProto => Side::Target,
            _ => Side::Source,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Marshal => "marshal",
            Self::Unmarshal => "unmarshal",
            Self::ToProto => "to-proto",
            Self::FromProto => "from-proto",
        })
    }
}

impl<'a> Request<'a> {
    pub fn new(source: &'a AttributeExpr, target: &'a AttributeExpr, direction: Direction) -> Self {
        Self {
            source,
            target,
            source_var: "source",
            target_var: "target",
            source_pkg: "",
            target_pkg: "",
            direction,
            declare_new: true,
        }
    }

    pub fn vars(mut self, source_var: &'a str, target_var: &'a str) -> Self {
        self.source_var = source_var;
        self.target_var = target_var;
        self
    }

    pub fn packages(mut self, source_pkg: &'a str, target_pkg: &'a str) -> Self {
        self.source_pkg = source_pkg;
        self.target_pkg = target_pkg;
        self
    }

    pub fn declare_new(mut self, declare_new: bool) -> Self {
        self.declare_new = declare_new;
        self
    }

    fn engine(&self, types: &'a TypeTable) -> Engine<'a> {
        Engine::new(types, self.direction, self.source_pkg, self.target_pkg)
    }
}

// ---- API ---- //

/// Generate the statements converting `source_var` into `target_var`.
///
/// Each call uses a fresh helper registry; use [`transform_with`] to share
/// helpers between several conversions.
pub fn transform(types: &TypeTable, request: &Request<'_>) -> Result<Transform, TransformError> {
    let mut registry = HelperRegistry::new();
    let code = transform_with(types, request, &mut registry)?;
    Ok(Transform { code, helpers: registry.into_helpers() })
}

/// Like [`transform`] but registers helpers into a caller-owned registry.
pub fn transform_with(
    types: &TypeTable,
    request: &Request<'_>,
    registry: &mut HelperRegistry,
) -> Result<String, TransformError> {
    request.engine(types).transform(
        registry,
        request.source,
        request.target,
        request.source_var,
        request.target_var,
        request.declare_new,
    )
}

/// Helper functions needed to convert `source` into `target`, without the
/// top-level statements.
pub fn collect_helpers(types: &TypeTable, request: &Request<'_>) -> Result<Vec<HelperDescriptor>, TransformError> {
    let mut registry = HelperRegistry::new();
    request.engine(types).collect_helpers(&mut registry, request.source, request.target)?;
    Ok(registry.into_helpers())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directions_pick_representations() {
        assert_eq!(Direction::Marshal.source_repr(), Representation::Service);
        assert_eq!(Direction::ToProto.target_repr(), Representation::ProtoBuf);
        assert_eq!(Direction::FromProto.source_repr(), Representation::ProtoBuf);
        assert_eq!(Direction::FromProto.service_side(), Side::Target);
        assert_eq!(Direction::Unmarshal.rigid_side(), None);
    }

    #[test]
    fn direction_serde_names() {
        let d: Direction = serde_json::from_str("\"from-proto\"").unwrap();
        assert_eq!(d, Direction::FromProto);
        assert_eq!(serde_json::to_string(&Direction::ToProto).unwrap(), "\"to-proto\"");
        for d in Direction::ALL {
            assert_eq!(serde_json::to_string(&d).unwrap(), format!("\"{d}\""));
        }
    }
}
