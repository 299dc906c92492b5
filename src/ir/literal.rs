use ordered_float::OrderedFloat;
use serde_json::Value;

use super::PrimitiveKind;

/// Default values attached to attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(OrderedFloat<f64>),
    String(String),
    Array(Vec<Literal>),
    Map(Vec<(Literal, Literal)>),
}

impl Literal {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => Literal::Null,
            Value::Bool(b) => Literal::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Literal::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Literal::UInt(u)
                } else {
                    Literal::Float(OrderedFloat(n.as_f64().unwrap_or_default()))
                }
            }
            Value::String(s) => Literal::String(s.clone()),
            Value::Array(xs) => Literal::Array(xs.iter().map(Literal::from_json).collect()),
            Value::Object(m) => Literal::Map(
                m.iter().map(|(k, v)| (Literal::String(k.clone()), Literal::from_json(v))).collect()
            ),
        }
    }

    /// Whether a scalar literal can initialize a field of the given primitive kind.
    pub fn fits(&self, kind: PrimitiveKind) -> bool {
        use PrimitiveKind as K;
        match (self, kind) {
            (_, K::Any) => true,
            (Literal::Bool(_), K::Boolean) => true,
            (Literal::Int(i), k) if k.is_integer() => *i >= 0 || !k.is_unsigned(),
            // only produced above i64::MAX
            (Literal::UInt(_), K::UInt | K::UInt64) => true,
            (Literal::Int(_) | Literal::UInt(_) | Literal::Float(_), k) if k.is_float() => true,
            (Literal::String(_), K::String | K::Bytes) => true,
            _ => false,
        }
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self { Literal::Bool(b) }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self { Literal::Int(i) }
}

impl From<i32> for Literal {
    fn from(i: i32) -> Self { Literal::Int(i64::from(i)) }
}

impl From<u64> for Literal {
    fn from(u: u64) -> Self { Literal::UInt(u) }
}

impl From<f64> for Literal {
    fn from(f: f64) -> Self { Literal::Float(OrderedFloat(f)) }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self { Literal::String(s.to_string()) }
}

impl From<String> for Literal {
    fn from(s: String) -> Self { Literal::String(s) }
}
