use indexmap::IndexMap;
use serde_json::{Map as JsonMap, Number, Value as JsonValue};

use crate::error::{Result, XnbError};

/// In-memory content tree produced by codecs on read and consumed on write.
///
/// Integers of every width share `Int`; both float widths share `Float`.
/// `Struct` keeps field order so exported JSON reads in wire order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    /// Ordered key/value pairs; keys are arbitrary values.
    Map(Vec<(Value, Value)>),
    Struct(IndexMap<String, Value>),
}

impl Value {
    /// Build a `Struct` from `(field, value)` pairs in order.
    pub fn record<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Struct(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Struct(_) => "struct",
        }
    }

    // ── Typed accessors ───────────────────────────────────────────────────
    //
    // Each takes the name of the codec asking so a mismatch reports where the
    // value tree diverged from the reader chain.

    pub fn try_bool(&self, codec: &str) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Err(XnbError::invalid_value(codec, "a bool")),
        }
    }

    pub fn try_i64(&self, codec: &str) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            _ => Err(XnbError::invalid_value(codec, "an integer")),
        }
    }

    /// Integers are accepted where floats are expected.
    pub fn try_f64(&self, codec: &str) -> Result<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            _ => Err(XnbError::invalid_value(codec, "a number")),
        }
    }

    pub fn try_char(&self, codec: &str) -> Result<char> {
        match self {
            Value::Char(c) => Ok(*c),
            _ => Err(XnbError::invalid_value(codec, "a char")),
        }
    }

    pub fn try_str(&self, codec: &str) -> Result<&str> {
        match self {
            Value::String(s) => Ok(s),
            _ => Err(XnbError::invalid_value(codec, "a string")),
        }
    }

    pub fn try_bytes(&self, codec: &str) -> Result<&[u8]> {
        match self {
            Value::Bytes(b) => Ok(b),
            _ => Err(XnbError::invalid_value(codec, "a byte buffer")),
        }
    }

    pub fn try_list(&self, codec: &str) -> Result<&[Value]> {
        match self {
            Value::List(items) => Ok(items),
            _ => Err(XnbError::invalid_value(codec, "a list")),
        }
    }

    pub fn try_map(&self, codec: &str) -> Result<&[(Value, Value)]> {
        match self {
            Value::Map(pairs) => Ok(pairs),
            _ => Err(XnbError::invalid_value(codec, "a map")),
        }
    }

    /// Look up a named field of a `Struct`.
    pub fn field(&self, codec: &str, name: &'static str) -> Result<&Value> {
        match self {
            Value::Struct(fields) => fields
                .get(name)
                .ok_or_else(|| XnbError::invalid_value(codec, name)),
            _ => Err(XnbError::invalid_value(codec, "a struct")),
        }
    }

    /// Structural conversion to JSON with no side files.
    ///
    /// Bytes become arrays of numbers; non-finite floats become `null`.
    /// Map keys must be strings, chars or numbers.
    pub fn to_json(&self) -> Result<JsonValue> {
        Ok(match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::from(*i),
            Value::Float(f) => Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number),
            Value::Char(c) => JsonValue::String(c.to_string()),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Bytes(b) => JsonValue::Array(b.iter().map(|&x| JsonValue::from(x)).collect()),
            Value::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect::<Result<_>>()?),
            Value::Map(pairs) => {
                let mut out = JsonMap::with_capacity(pairs.len());
                for (k, v) in pairs {
                    out.insert(k.to_key()?, v.to_json()?);
                }
                JsonValue::Object(out)
            }
            Value::Struct(fields) => {
                let mut out = JsonMap::with_capacity(fields.len());
                for (k, v) in fields {
                    out.insert(k.clone(), v.to_json()?);
                }
                JsonValue::Object(out)
            }
        })
    }

    /// Render a scalar as a JSON object key.
    pub fn to_key(&self) -> Result<String> {
        match self {
            Value::String(s) => Ok(s.clone()),
            Value::Char(c) => Ok(c.to_string()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            other => Err(XnbError::UnsupportedKey(other.kind().to_string())),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
