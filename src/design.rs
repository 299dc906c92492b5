//! Design documents: a JSON description of user types and of the conversions
//! to generate between them.
//!
//! ```json
//! {
//!   "types": {
//!     "User": { "object": { "id": "string", "age": {"type": "int", "default": 18} },
//!               "required": ["id"] }
//!   },
//!   "requests": [
//!     { "name": "user", "source": "User", "target": "User", "direction": "to-proto",
//!       "target_pkg": "pb" }
//!   ]
//! }
//! ```
//!
//! Every type name is declared before any definition is lowered, so types
//! may refer to themselves and to each other in any order.
use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::codegen::{wrap, Direction, Request};
use crate::error::DesignError;
use crate::ir::{AttributeExpr, DataType, Literal, PrimitiveKind, TypeTable};

// ————————————————————————————————————————————————————————————————————————————
// DOCUMENT MODEL
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesignDoc {
    #[serde(default)]
    pub types: IndexMap<String, TypeExpr>,
    #[serde(default)]
    pub requests: Vec<RequestDoc>,
}

/// A type name (primitive or declared) or an inline attribute.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TypeExpr {
    Name(String),
    Attribute(Box<AttributeDoc>),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeDoc {
    #[serde(rename = "type")]
    pub ty: Option<TypeExpr>,
    pub object: Option<IndexMap<String, TypeExpr>>,
    pub array: Option<TypeExpr>,
    pub map: Option<(TypeExpr, TypeExpr)>,
    /// Protobuf wrapper message around the given type.
    pub wrap: Option<TypeExpr>,
    #[serde(default)]
    pub required: Vec<String>,
    pub default: Option<serde_json::Value>,
    pub alias: Option<String>,
    pub origin: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestDoc {
    pub name: String,
    pub source: TypeExpr,
    pub target: TypeExpr,
    pub direction: Direction,
    #[serde(default = "default_source_var")]
    pub source_var: String,
    #[serde(default = "default_target_var")]
    pub target_var: String,
    #[serde(default)]
    pub source_pkg: String,
    #[serde(default)]
    pub target_pkg: String,
    #[serde(default = "default_declare_new")]
    pub declare_new: bool,
}

fn default_source_var() -> String { "source".to_string() }
fn default_target_var() -> String { "target".to_string() }
fn default_declare_new() -> bool { true }

// ————————————————————————————————————————————————————————————————————————————
// LOWERED DESIGN
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone)]
pub struct Design {
    pub types: TypeTable,
    pub requests: Vec<DesignRequest>,
}

#[derive(Debug, Clone)]
pub struct DesignRequest {
    pub name: String,
    pub source: AttributeExpr,
    pub target: AttributeExpr,
    pub direction: Direction,
    pub source_var: String,
    pub target_var: String,
    pub source_pkg: String,
    pub target_pkg: String,
    pub declare_new: bool,
}

impl DesignRequest {
    pub fn as_request(&self) -> Request<'_> {
        Request::new(&self.source, &self.target, self.direction)
            .vars(&self.source_var, &self.target_var)
            .packages(&self.source_pkg, &self.target_pkg)
            .declare_new(self.declare_new)
    }
}

impl Design {
    /// Parse and lower a design document.
    pub fn parse(src: &str) -> Result<Self, DesignError> {
        let doc: DesignDoc = crate::path_de::from_str_with_path(src)?;
        doc.lower()
    }

    pub fn request(&self, name: &str) -> Option<&DesignRequest> {
        self.requests.iter().find(|r| r.name == name)
    }
}

impl DesignDoc {
    pub fn lower(&self) -> Result<Design, DesignError> {
        let mut types = TypeTable::new();
        for name in self.types.keys() {
            if PrimitiveKind::from_name(name).is_some() {
                return Err(DesignError::ReservedName(name.clone()));
            }
            types.declare(name.clone());
        }
        for (name, expr) in &self.types {
            let context = format!("types.{name}");
            let attr = match expr {
                TypeExpr::Attribute(doc) => lower_attribute(&types, doc, &context, true)?,
                TypeExpr::Name(_) => lower_expr(&types, expr, &context)?,
            };
            if let Some(id) = types.find(name) {
                types.define(id, attr);
            }
        }
        let mut requests: Vec<DesignRequest> = Vec::with_capacity(self.requests.len());
        for (i, req) in self.requests.iter().enumerate() {
            if requests.iter().any(|r| r.name == req.name) {
                return Err(DesignError::DuplicateRequest(req.name.clone()));
            }
            requests.push(DesignRequest {
                name: req.name.clone(),
                source: lower_expr(&types, &req.source, &format!("requests[{i}].source"))?,
                target: lower_expr(&types, &req.target, &format!("requests[{i}].target"))?,
                direction: req.direction,
                source_var: req.source_var.clone(),
                target_var: req.target_var.clone(),
                source_pkg: req.source_pkg.clone(),
                target_pkg: req.target_pkg.clone(),
                declare_new: req.declare_new,
            });
        }
        debug!(types = types.len(), requests = requests.len(), "lowered design");
        Ok(Design { types, requests })
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn lower_expr(types: &TypeTable, expr: &TypeExpr, context: &str) -> Result<AttributeExpr, DesignError> {
    match expr {
        TypeExpr::Name(name) => named(types, name, context),
        TypeExpr::Attribute(doc) => lower_attribute(types, doc, context, false),
    }
}

fn named(types: &TypeTable, name: &str, context: &str) -> Result<AttributeExpr, DesignError> {
    if let Some(kind) = PrimitiveKind::from_name(name) {
        return Ok(AttributeExpr::primitive(kind));
    }
    types.find(name).map(AttributeExpr::user).ok_or_else(|| DesignError::UnknownType {
        name: name.to_string(),
        context: context.to_string(),
    })
}

fn lower_attribute(
    types: &TypeTable,
    doc: &AttributeDoc,
    context: &str,
    allow_wrap: bool,
) -> Result<AttributeExpr, DesignError> {
    let mut attr = match (&doc.ty, &doc.object, &doc.array, &doc.map, &doc.wrap) {
        (Some(ty), None, None, None, None) => lower_expr(types, ty, context)?,
        (None, Some(fields), None, None, None) => {
            let mut lowered = Vec::with_capacity(fields.len());
            for (key, expr) in fields {
                check_field_key(key, context)?;
                lowered.push((key.clone(), lower_expr(types, expr, &format!("{context}.{key}"))?));
            }
            AttributeExpr::object(lowered)
        }
        (None, None, Some(elem), None, None) => {
            AttributeExpr::array(lower_expr(types, elem, &format!("{context}[*]"))?)
        }
        (None, None, None, Some((key, elem)), None) => AttributeExpr::map(
            lower_expr(types, key, &format!("{context}[key]"))?,
            lower_expr(types, elem, &format!("{context}[value]"))?,
        ),
        (None, None, None, None, Some(inner)) if allow_wrap => {
            wrap::wrapper_definition(lower_expr(types, inner, &format!("{context}.field"))?)
        }
        (None, None, None, None, Some(_)) => {
            return Err(DesignError::MisplacedWrap { context: context.to_string() });
        }
        _ => return Err(DesignError::AmbiguousShape { context: context.to_string() }),
    };

    if let DataType::Object(object) = &attr.ty {
        for name in &doc.required {
            if object.attribute(name).is_none() {
                return Err(DesignError::UnknownRequired { name: name.clone(), context: context.to_string() });
            }
        }
    }
    attr.required.extend(doc.required.iter().cloned());

    if let Some(value) = &doc.default {
        let literal = Literal::from_json(value);
        if !default_fits(&literal, &attr) {
            return Err(DesignError::InvalidDefault {
                context: context.to_string(),
                expected: types.describe(&attr),
            });
        }
        attr.default_value = Some(literal);
    }
    if let Some(alias) = &doc.alias {
        attr.field_alias = Some(alias.clone());
    }
    if let Some(origin) = &doc.origin {
        attr.origin_attribute = Some(origin.clone());
    }
    attr.tags.extend(doc.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(attr)
}

/// `logical` or `logical:physical`, both parts non-empty.
fn check_field_key(key: &str, context: &str) -> Result<(), DesignError> {
    let valid = match key.split_once(':') {
        Some((logical, physical)) => {
            !logical.is_empty() && !physical.is_empty() && !physical.contains(':')
        }
        None => !key.is_empty(),
    };
    if valid {
        return Ok(());
    }
    Err(DesignError::InvalidFieldKey { key: key.to_string(), context: context.to_string() })
}

/// Structural check of a default value. Defaults on user types are accepted
/// as is since their definitions may not be lowered yet.
fn default_fits(literal: &Literal, attr: &AttributeExpr) -> bool {
    match (&attr.ty, literal) {
        (DataType::UserType(_), _) => true,
        (DataType::Primitive(kind), lit) => lit.fits(*kind),
        (DataType::Array(elem), Literal::Array(items)) => items.iter().all(|i| default_fits(i, elem)),
        (DataType::Map(key, elem), Literal::Map(entries)) => {
            entries.iter().all(|(k, v)| default_fits(k, key) && default_fits(v, elem))
        }
        _ => false,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
