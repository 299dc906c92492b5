//! Identifier casing, type references and literal rendering for the emitted Go code.
use std::collections::HashSet;
use std::fmt::Write as _;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Direction, Representation};
use crate::ir::{AttributeExpr, DataType, Literal, MappedAttributeExpr, PrimitiveKind, TypeTable};

// ------------------------------- Policy ---------------------------------- //

/// Common initialisms kept fully upper-cased in service identifiers.
static INITIALISMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "ACL", "API", "ASCII", "CPU", "CSS", "DNS", "EOF", "GUID", "HTML", "HTTP", "HTTPS",
        "ID", "IP", "JMX", "JSON", "JWT", "LHS", "OK", "QPS", "RAM", "RHS", "RPC", "SLA",
        "SMTP", "SQL", "SSH", "TCP", "TLS", "TTL", "UDP", "UI", "UID", "UUID", "URI", "URL",
        "UTF8", "VM", "XML", "XMPP", "XSRF", "XSS",
    ].into_iter().collect()
});

/// Protobuf scalar type keywords; message fields with these names get a `_` suffix.
static PROTO_RESERVED: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "double", "float", "int32", "int64", "uint32", "uint64", "sint32", "sint64",
        "fixed32", "fixed64", "sfixed32", "sfixed64", "bool", "string", "bytes",
    ].into_iter().collect()
});

static SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("static regex"));

/// Suffix added to a type name that comes from outside the generation unit.
pub const EXTERNAL_SUFFIX: &str = "Ext";
/// Suffix marking the protobuf side in helper names.
pub const PROTOBUF_SUFFIX: &str = "ProtoBuf";

// ------------------------------- Casing ---------------------------------- //

/// Split an identifier into words on separators and case boundaries.
/// `HTTPServer` → `HTTP`, `Server`; `user_id` → `user`, `id`; digits stick to the previous word.
fn words(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    for chunk in SEPARATORS.split(s).filter(|c| !c.is_empty()) {
        let chars: Vec<char> = chunk.chars().collect();
        let mut start = 0;
        for i in 1..chars.len() {
            let (prev, cur) = (chars[i - 1], chars[i]);
            let next_lower = chars.get(i + 1).is_some_and(|c| c.is_ascii_lowercase());
            let lower_to_upper = (prev.is_ascii_lowercase() || prev.is_ascii_digit()) && cur.is_ascii_uppercase();
            let acronym_end = prev.is_ascii_uppercase() && cur.is_ascii_uppercase() && next_lower;
            if lower_to_upper || acronym_end {
                out.push(chars[start..i].iter().collect());
                start = i;
            }
        }
        out.push(chars[start..].iter().collect());
    }
    out
}

fn camel_case(s: &str, first_upper: bool, initialisms: bool) -> String {
    let mut out = String::new();
    for (i, word) in words(s).into_iter().enumerate() {
        let upper = word.to_ascii_uppercase();
        if initialisms && INITIALISMS.contains(upper.as_str()) {
            if i == 0 && !first_upper {
                out.push_str(&word.to_ascii_lowercase());
            } else {
                out.push_str(&upper);
            }
            continue;
        }
        let mut cs = word.chars();
        if let Some(first) = cs.next() {
            if i == 0 && !first_upper {
                if word.chars().all(|c| !c.is_ascii_lowercase()) {
                    // all-caps leading word: lower it entirely
                    out.push_str(&word.to_ascii_lowercase());
                    continue;
                }
                out.push(first.to_ascii_lowercase());
            } else {
                out.push(first.to_ascii_uppercase());
            }
            out.extend(cs);
        }
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Go identifier with common initialisms (`user_id` → `UserID`).
pub fn goify(s: &str, first_upper: bool) -> String {
    camel_case(s, first_upper, true)
}

/// Identifier as the protobuf Go compiler spells it (`user_id` → `UserId`).
pub fn protobufify(s: &str, first_upper: bool) -> String {
    camel_case(s, first_upper, false)
}

/// Struct field identifier for a physical field name.
pub fn field_name(physical: &str, repr: Representation) -> String {
    match repr {
        Representation::Service => goify(physical, true),
        Representation::ProtoBuf => {
            let name = protobufify(physical, true);
            if PROTO_RESERVED.contains(physical.to_ascii_lowercase().as_str()) {
                format!("{name}_")
            } else {
                name
            }
        }
    }
}

// ------------------------------- Types ----------------------------------- //

pub fn native_type(kind: PrimitiveKind, repr: Representation) -> &'static str {
    use PrimitiveKind as K;
    match (kind, repr) {
        (K::Int, Representation::ProtoBuf) => "int32",
        (K::UInt, Representation::ProtoBuf) => "uint32",
        (K::Boolean, _) => "bool",
        (K::Int, _) => "int",
        (K::Int32, _) => "int32",
        (K::Int64, _) => "int64",
        (K::UInt, _) => "uint",
        (K::UInt32, _) => "uint32",
        (K::UInt64, _) => "uint64",
        (K::Float32, _) => "float32",
        (K::Float64, _) => "float64",
        (K::String, _) => "string",
        (K::Bytes, _) => "[]byte",
        (K::Any, _) => "interface{}",
    }
}

pub fn qualified(pkg: &str, name: &str) -> String {
    if pkg.is_empty() { name.to_string() } else { format!("{pkg}.{name}") }
}

/// Unqualified name of a user type in the given representation.
pub fn user_type_name(types: &TypeTable, attr: &AttributeExpr, repr: Representation) -> Option<String> {
    let id = attr.user_type_id()?;
    Some(match repr {
        Representation::Service => goify(types.name(id), true),
        Representation::ProtoBuf => protobufify(types.name(id), true),
    })
}

fn resolves_to_object(types: &TypeTable, attr: &AttributeExpr) -> bool {
    matches!(types.resolve(attr).map(|a| &a.ty), Ok(DataType::Object(_)))
}

/// Reference to the Go type holding values of `attr` (pointer for struct types).
pub fn type_ref(types: &TypeTable, attr: &AttributeExpr, pkg: &str, repr: Representation) -> String {
    match &attr.ty {
        DataType::Primitive(k) => native_type(*k, repr).to_string(),
        DataType::Array(elem) => format!("[]{}", type_ref(types, elem, pkg, repr)),
        DataType::Map(key, elem) => format!(
            "map[{}]{}", type_ref(types, key, pkg, repr), type_ref(types, elem, pkg, repr)
        ),
        DataType::Object(_) => struct_def(types, attr, pkg, repr),
        DataType::UserType(id) => {
            let object = resolves_to_object(types, attr);
            if repr == Representation::ProtoBuf && !object {
                // only messages are named on the wire side
                return match types.definition(*id) {
                    Ok(def) => type_ref(types, def, pkg, repr),
                    Err(_) => "interface{}".to_string(),
                };
            }
            let name = user_type_name(types, attr, repr).unwrap_or_default();
            let name = qualified(pkg, &name);
            if object { format!("*{name}") } else { name }
        }
    }
}

/// Name used in a composite literal: the qualified struct name or an inline struct type.
pub fn full_type_name(types: &TypeTable, attr: &AttributeExpr, pkg: &str, repr: Representation) -> String {
    match &attr.ty {
        DataType::UserType(_) => {
            qualified(pkg, &user_type_name(types, attr, repr).unwrap_or_default())
        }
        DataType::Object(_) => struct_def(types, attr, pkg, repr),
        _ => type_ref(types, attr, pkg, repr),
    }
}

/// Whether a Go value of `attr`'s type can be nil. Named structs are held
/// by pointer, anonymous structs by value.
pub fn is_nilable(types: &TypeTable, attr: &AttributeExpr) -> bool {
    match types.resolve(attr).map(|a| &a.ty) {
        Ok(DataType::Object(_)) => attr.user_type_id().is_some(),
        Ok(DataType::Array(_) | DataType::Map(_, _)) => true,
        Ok(DataType::Primitive(kind)) => *kind == PrimitiveKind::Any,
        Ok(DataType::UserType(_)) | Err(_) => false,
    }
}

/// Zero value of the type referenced by `type_ref`.
pub fn zero_value(types: &TypeTable, attr: &AttributeExpr, type_ref: &str) -> String {
    if is_nilable(types, attr) {
        return "nil".to_string();
    }
    match types.primitive_kind(attr) {
        Some(PrimitiveKind::Boolean) => "false".to_string(),
        Some(PrimitiveKind::String) => "\"\"".to_string(),
        Some(kind) if kind.is_integer() || kind.is_float() => "0".to_string(),
        _ => format!("{type_ref}{{}}"),
    }
}

fn struct_def(types: &TypeTable, attr: &AttributeExpr, pkg: &str, repr: Representation) -> String {
    let Ok(mapped) = MappedAttributeExpr::new(types, attr) else {
        return "struct{}".to_string();
    };
    if mapped.fields().is_empty() {
        return "struct{}".to_string();
    }
    let fields = mapped.fields().iter().map(|f| {
        let pointer = repr == Representation::Service && mapped.is_primitive_pointer(types, f.logical, true);
        format!(
            "{} {}{}",
            mapped.field_name_for(f.logical, repr),
            if pointer { "*" } else { "" },
            type_ref(types, f.attribute, pkg, repr),
        )
    }).collect::<Vec<_>>();
    format!("struct {{ {} }}", fields.join("; "))
}

// ------------------------------- Helpers --------------------------------- //

/// Name fragment identifying `attr` in a helper name.
pub fn helper_type_name(types: &TypeTable, attr: &AttributeExpr) -> String {
    let mut name = match &attr.ty {
        DataType::UserType(id) => goify(types.name(*id), true),
        DataType::Primitive(k) => goify(k.name(), true),
        DataType::Object(_) => "Object".to_string(),
        DataType::Array(elem) => format!("ArrayOf{}", helper_type_name(types, elem)),
        DataType::Map(key, elem) => format!(
            "MapOf{}{}", helper_type_name(types, key), helper_type_name(types, elem)
        ),
    };
    let external = attr.is_external()
        || attr.user_type_id()
            .and_then(|id| types.definition(id).ok())
            .is_some_and(AttributeExpr::is_external);
    if external {
        name.push_str(EXTERNAL_SUFFIX);
    }
    name
}

/// Deterministic helper function name for a (source, target, direction) triple.
pub fn helper_name(types: &TypeTable, source: &AttributeExpr, target: &AttributeExpr, direction: Direction) -> String {
    let sname = helper_type_name(types, source);
    let tname = helper_type_name(types, target);
    let raw = match direction {
        Direction::Marshal => format!("marshal{sname}To{tname}"),
        Direction::Unmarshal => format!("unmarshal{sname}To{tname}"),
        Direction::ToProto => format!("{sname}To{tname}{PROTOBUF_SUFFIX}"),
        Direction::FromProto => format!("{sname}{PROTOBUF_SUFFIX}To{tname}"),
    };
    goify(&raw, false)
}

// ------------------------------- Literals -------------------------------- //

/// Go interpreted string literal.
pub fn go_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Render a default value as a Go expression assignable to a field of type `attr`.
pub fn go_literal(types: &TypeTable, lit: &Literal, attr: &AttributeExpr, pkg: &str, repr: Representation) -> String {
    let resolved = types.resolve(attr).unwrap_or(attr);
    match lit {
        Literal::Null => "nil".to_string(),
        Literal::Bool(b) => b.to_string(),
        Literal::Int(i) => i.to_string(),
        Literal::UInt(u) => u.to_string(),
        Literal::Float(f) => f.0.to_string(),
        Literal::String(s) => match resolved.ty {
            DataType::Primitive(PrimitiveKind::Bytes) => format!("[]byte({})", go_quote(s)),
            _ => go_quote(s),
        },
        Literal::Array(items) => {
            let elem = match &resolved.ty {
                DataType::Array(elem) => elem.as_ref(),
                _ => attr,
            };
            let items = items.iter()
                .map(|i| go_literal(types, i, elem, pkg, repr))
                .collect::<Vec<_>>();
            format!("{}{{{}}}", type_ref(types, attr, pkg, repr), items.join(", "))
        }
        Literal::Map(entries) => {
            let (key, elem) = match &resolved.ty {
                DataType::Map(key, elem) => (key.as_ref(), elem.as_ref()),
                _ => (attr, attr),
            };
            let entries = entries.iter()
                .map(|(k, v)| format!(
                    "{}: {}",
                    go_literal(types, k, key, pkg, repr),
                    go_literal(types, v, elem, pkg, repr),
                ))
                .collect::<Vec<_>>();
            format!("{}{{{}}}", type_ref(types, attr, pkg, repr), entries.join(", "))
        }
    }
}

// ------------------------------- Tests ----------------------------------- //
