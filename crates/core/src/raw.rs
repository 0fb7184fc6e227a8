//! Raw incoming values, tagged by the representation they arrived in.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::values::{format_date_time, Value};

/// A value before coercion. The variant records how the value was
/// represented by the transport, not what the target field expects.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    DateTime(OffsetDateTime),
    /// A structured key/display mapping, e.g. `{"key": "DE", "display": "Germany"}`.
    Mapping(BTreeMap<String, String>),
    /// A value that has already been coerced.
    Typed(Value),
}

impl RawValue {
    /// Name of the representation, used in conversion errors.
    pub fn representation(&self) -> &'static str {
        match self {
            RawValue::Null => "null",
            RawValue::Text(_) => "text",
            RawValue::Integer(_) => "integer number",
            RawValue::Float(_) => "float number",
            RawValue::Boolean(_) => "boolean",
            RawValue::DateTime(_) => "date_time",
            RawValue::Mapping(_) => "mapping",
            RawValue::Typed(v) => v.type_name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    /// Decode a transport JSON value.
    ///
    /// Objects become mappings with their entries stringified; arrays become
    /// mappings keyed by position so that they are never mistaken for text.
    pub fn from_json(v: &serde_json::Value) -> RawValue {
        match v {
            serde_json::Value::Null => RawValue::Null,
            serde_json::Value::Bool(b) => RawValue::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => RawValue::Integer(i),
                None => RawValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => RawValue::Text(s.clone()),
            serde_json::Value::Object(obj) => RawValue::Mapping(
                obj.iter()
                    .filter_map(|(k, v)| json_entry_text(v).map(|s| (k.clone(), s)))
                    .collect(),
            ),
            serde_json::Value::Array(items) => RawValue::Mapping(
                items
                    .iter()
                    .enumerate()
                    .filter_map(|(i, v)| json_entry_text(v).map(|s| (i.to_string(), s)))
                    .collect(),
            ),
        }
    }
}

fn json_entry_text(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Null => f.write_str("null"),
            RawValue::Text(s) => f.write_str(s),
            RawValue::Integer(i) => write!(f, "{}", i),
            RawValue::Float(x) => write!(f, "{}", x),
            RawValue::Boolean(b) => write!(f, "{}", b),
            RawValue::DateTime(dt) => f.write_str(&format_date_time(dt)),
            RawValue::Mapping(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                f.write_str("}")
            }
            RawValue::Typed(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::Text(s)
    }
}

impl From<i64> for RawValue {
    fn from(i: i64) -> Self {
        RawValue::Integer(i)
    }
}

impl From<f64> for RawValue {
    fn from(x: f64) -> Self {
        RawValue::Float(x)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Boolean(b)
    }
}

impl From<Decimal> for RawValue {
    fn from(d: Decimal) -> Self {
        RawValue::Typed(Value::Decimal(d))
    }
}

impl From<OffsetDateTime> for RawValue {
    fn from(dt: OffsetDateTime) -> Self {
        RawValue::DateTime(dt)
    }
}

impl From<Value> for RawValue {
    fn from(v: Value) -> Self {
        RawValue::Typed(v)
    }
}

impl From<Option<Value>> for RawValue {
    fn from(v: Option<Value>) -> Self {
        v.map_or(RawValue::Null, RawValue::Typed)
    }
}

impl From<&serde_json::Value> for RawValue {
    fn from(v: &serde_json::Value) -> Self {
        RawValue::from_json(v)
    }
}
