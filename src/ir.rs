// Strongly-typed type model consumed by the transform engine. Pure data: identity and lookup.
pub mod literal;
pub mod mapped;

use std::collections::BTreeMap;
use std::fmt;

pub use literal::Literal;
pub use mapped::{MappedAttributeExpr, MappedField};

use crate::error::TransformError;

/// Tag carrying the protobuf field number of an attribute.
pub const TAG_RPC: &str = "rpc:tag";
/// Tag marking a type that lives outside the current generation unit.
pub const TAG_EXTERNAL: &str = "external";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    Boolean,
    Int,
    Int32,
    Int64,
    UInt,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    Bytes,
    Any,
}

/// Identity of a user type inside a [`TypeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) usize);

#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    Primitive(PrimitiveKind),
    Object(Object),
    Array(Box<AttributeExpr>),
    Map(Box<AttributeExpr>, Box<AttributeExpr>),
    UserType(TypeId),
}

/// Ordered fields; order only matters for deterministic output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object {
    pub fields: Vec<NamedAttribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedAttribute {
    /// Either `logical` or `logical:physical`.
    pub name: String,
    pub attribute: AttributeExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeExpr {
    pub ty: DataType,
    /// Required children when `ty` is an object.
    pub required: Vec<String>,
    pub default_value: Option<Literal>,
    pub field_alias: Option<String>,
    pub origin_attribute: Option<String>,
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserTypeDef {
    pub name: String,
    /// `None` between `declare` and `define`.
    pub definition: Option<AttributeExpr>,
}

/// Arena of user types. Declaring before defining is what makes recursive types expressible.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    types: Vec<UserTypeDef>,
}

/// Coarse shape category used for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Primitive(PrimitiveKind),
    Object,
    Array,
    Map,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 12] = [
        Self::Boolean, Self::Int, Self::Int32, Self::Int64,
        Self::UInt, Self::UInt32, Self::UInt64,
        Self::Float32, Self::Float64, Self::String, Self::Bytes, Self::Any,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Int => "int",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt => "uint",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Any => "any",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Self::Int | Self::Int32 | Self::Int64 | Self::UInt | Self::UInt32 | Self::UInt64)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, Self::UInt | Self::UInt32 | Self::UInt64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Bytes and any are reference-like already and never stored behind a pointer.
    pub fn pointer_capable(self) -> bool {
        !matches!(self, Self::Bytes | Self::Any)
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeKind::Primitive(k) => write!(f, "a {k}"),
            ShapeKind::Object => f.write_str("an object"),
            ShapeKind::Array => f.write_str("an array"),
            ShapeKind::Map => f.write_str("a map"),
        }
    }
}

impl From<DataType> for AttributeExpr {
    fn from(ty: DataType) -> Self {
        AttributeExpr {
            ty,
            required: Vec::new(),
            default_value: None,
            field_alias: None,
            origin_attribute: None,
            tags: BTreeMap::new(),
        }
    }
}

impl AttributeExpr {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        DataType::Primitive(kind).into()
    }

    pub fn object<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, AttributeExpr)>,
        S: Into<String>,
    {
        let fields = fields.into_iter()
            .map(|(name, attribute)| NamedAttribute { name: name.into(), attribute })
            .collect();
        DataType::Object(Object { fields }).into()
    }

    pub fn array(elem: AttributeExpr) -> Self {
        DataType::Array(Box::new(elem)).into()
    }

    pub fn map(key: AttributeExpr, elem: AttributeExpr) -> Self {
        DataType::Map(Box::new(key), Box::new(elem)).into()
    }

    pub fn user(id: TypeId) -> Self {
        DataType::UserType(id).into()
    }

    pub fn with_required<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_default(mut self, value: impl Into<Literal>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.field_alias = Some(alias.into());
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin_attribute = Some(origin.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn user_type_id(&self) -> Option<TypeId> {
        match self.ty {
            DataType::UserType(id) => Some(id),
            _ => None,
        }
    }

    /// True when the attribute's own type is an anonymous object (not a user type).
    pub fn is_bare_object(&self) -> bool {
        matches!(self.ty, DataType::Object(_))
    }

    pub fn is_external(&self) -> bool {
        self.tags.contains_key(TAG_EXTERNAL)
    }
}

impl Object {
    /// Field by logical name (the part before `:` in `logical:physical`).
    pub fn attribute(&self, logical: &str) -> Option<&AttributeExpr> {
        self.fields.iter()
            .find(|f| mapped::split_name(&f.name).0 == logical)
            .map(|f| &f.attribute)
    }
}

impl TypeTable {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.types.len() }

    pub fn is_empty(&self) -> bool { self.types.is_empty() }

    /// Reserve an identity for `name`; the definition comes later.
    pub fn declare(&mut self, name: impl Into<String>) -> TypeId {
        self.types.push(UserTypeDef { name: name.into(), definition: None });
        TypeId(self.types.len() - 1)
    }

    pub fn define(&mut self, id: TypeId, definition: AttributeExpr) {
        self.types[id.0].definition = Some(definition);
    }

    /// Declare and define in one go, returning an attribute referencing the new type.
    pub fn user_type(&mut self, name: impl Into<String>, definition: AttributeExpr) -> AttributeExpr {
        let id = self.declare(name);
        self.define(id, definition);
        AttributeExpr::user(id)
    }

    pub fn name(&self, id: TypeId) -> &str {
        &self.types[id.0].name
    }

    pub fn find(&self, name: &str) -> Option<TypeId> {
        self.types.iter().position(|t| t.name == name).map(TypeId)
    }

    pub fn definition(&self, id: TypeId) -> Result<&AttributeExpr, TransformError> {
        self.types[id.0].definition.as_ref().ok_or_else(|| TransformError::UnresolvedType {
            name: self.types[id.0].name.clone(),
        })
    }

    /// Follow user type links down to the structural attribute.
    pub fn resolve<'a>(&'a self, attr: &'a AttributeExpr) -> Result<&'a AttributeExpr, TransformError> {
        let mut current = attr;
        // a chain longer than the table itself must loop back on itself
        for _ in 0..=self.types.len() {
            match current.ty {
                DataType::UserType(id) => current = self.definition(id)?,
                _ => return Ok(current),
            }
        }
        Err(TransformError::UnresolvedType { name: self.describe(attr) })
    }

    pub fn shape(&self, attr: &AttributeExpr) -> Result<ShapeKind, TransformError> {
        Ok(match &self.resolve(attr)?.ty {
            DataType::Primitive(k) => ShapeKind::Primitive(*k),
            DataType::Object(_) => ShapeKind::Object,
            DataType::Array(_) => ShapeKind::Array,
            DataType::Map(_, _) => ShapeKind::Map,
            DataType::UserType(_) => unreachable!("resolve never stops on a user type"),
        })
    }

    pub fn primitive_kind(&self, attr: &AttributeExpr) -> Option<PrimitiveKind> {
        match self.shape(attr) {
            Ok(ShapeKind::Primitive(k)) => Some(k),
            _ => None,
        }
    }

    pub fn is_primitive(&self, attr: &AttributeExpr) -> bool {
        self.primitive_kind(attr).is_some()
    }

    /// Short human description: the user type name when there is one, otherwise the shape.
    pub fn describe(&self, attr: &AttributeExpr) -> String {
        match &attr.ty {
            DataType::UserType(id) => self.name(*id).to_string(),
            DataType::Primitive(k) => k.name().to_string(),
            DataType::Object(_) => "object".to_string(),
            DataType::Array(elem) => format!("array<{}>", self.describe(elem)),
            DataType::Map(key, elem) => format!("map<{}, {}>", self.describe(key), self.describe(elem)),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
