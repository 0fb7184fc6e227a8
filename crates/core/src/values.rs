//! Typed field values, target types and lookup value pairs.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

// ──────────────────────────────────────────────
// Target types
// ──────────────────────────────────────────────

/// Semantic type a field descriptor declares for its value slot.
///
/// A field's stored value is always either absent or a [`Value`] whose
/// [`Value::field_type`] equals this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Boolean,
    Integer,
    Decimal,
    DateTime,
    /// Single-select lookup keyed by text identifiers.
    TextLookup,
    /// Lookup keyed by integer identifiers.
    IntegerLookup,
}

impl FieldType {
    /// Returns the name used in descriptors and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Boolean => "boolean",
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
            FieldType::DateTime => "date_time",
            FieldType::TextLookup => "text_lookup",
            FieldType::IntegerLookup => "integer_lookup",
        }
    }

    pub fn is_lookup(&self) -> bool {
        matches!(self, FieldType::TextLookup | FieldType::IntegerLookup)
    }

    /// True for lookups whose key space is numeric.
    pub fn is_numeric_lookup(&self) -> bool {
        matches!(self, FieldType::IntegerLookup)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

// ──────────────────────────────────────────────
// Lookup values
// ──────────────────────────────────────────────

/// Identifier of a lookup entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LookupKey {
    Integer(i64),
    Text(String),
}

impl LookupKey {
    pub fn is_numeric(&self) -> bool {
        matches!(self, LookupKey::Integer(_))
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            LookupKey::Integer(i) => serde_json::json!(i),
            LookupKey::Text(s) => serde_json::json!(s),
        }
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKey::Integer(i) => write!(f, "{}", i),
            LookupKey::Text(s) => f.write_str(s),
        }
    }
}

/// A resolved (key, display name) pair as shown by a lookup widget.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupValue {
    key: LookupKey,
    display_name: String,
}

impl LookupValue {
    pub fn new(key: LookupKey, display_name: impl Into<String>) -> Self {
        LookupValue {
            key,
            display_name: display_name.into(),
        }
    }

    pub fn text(key: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::new(LookupKey::Text(key.into()), display_name)
    }

    pub fn integer(key: i64, display_name: impl Into<String>) -> Self {
        Self::new(LookupKey::Integer(key), display_name)
    }

    pub fn key(&self) -> &LookupKey {
        &self.key
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "key": self.key.to_json(),
            "display": self.display_name,
        })
    }
}

// ──────────────────────────────────────────────
// Runtime values
// ──────────────────────────────────────────────

/// A coerced field value. Decimals use `rust_decimal::Decimal`, never `f64`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    DateTime(OffsetDateTime),
    Lookup(LookupValue),
}

impl Value {
    /// The target type this value is an instance of.
    pub fn field_type(&self) -> FieldType {
        match self {
            Value::Text(_) => FieldType::Text,
            Value::Boolean(_) => FieldType::Boolean,
            Value::Integer(_) => FieldType::Integer,
            Value::Decimal(_) => FieldType::Decimal,
            Value::DateTime(_) => FieldType::DateTime,
            Value::Lookup(lv) if lv.key().is_numeric() => FieldType::IntegerLookup,
            Value::Lookup(_) => FieldType::TextLookup,
        }
    }

    /// Returns a human-readable type name for error messages.
    pub fn type_name(&self) -> &'static str {
        self.field_type().type_name()
    }

    pub fn as_lookup(&self) -> Option<&LookupValue> {
        match self {
            Value::Lookup(lv) => Some(lv),
            _ => None,
        }
    }

    /// Text shown to a user: booleans as Yes/No, lookups by display name.
    pub fn display_string(&self) -> String {
        match self {
            Value::Boolean(true) => "Yes".to_string(),
            Value::Boolean(false) => "No".to_string(),
            Value::Lookup(lv) => lv.display_name().to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::DateTime(dt) => f.write_str(&format_date_time(dt)),
            Value::Lookup(lv) => f.write_str(lv.display_name()),
        }
    }
}

impl From<LookupValue> for Value {
    fn from(lv: LookupValue) -> Self {
        Value::Lookup(lv)
    }
}

/// Formats a date/time as RFC 3339, falling back to the `time` display form
/// for years RFC 3339 cannot express.
pub fn format_date_time(dt: &OffsetDateTime) -> String {
    dt.format(&Rfc3339).unwrap_or_else(|_| dt.to_string())
}

/// Convert an optional field value to its JSON form for UI output.
///
/// Decimals are emitted as strings to keep their exact scale.
pub fn value_to_json(value: Option<&Value>) -> serde_json::Value {
    match value {
        None => serde_json::Value::Null,
        Some(Value::Text(s)) => serde_json::json!(s),
        Some(Value::Boolean(b)) => serde_json::json!(b),
        Some(Value::Integer(i)) => serde_json::json!(i),
        Some(Value::Decimal(d)) => serde_json::json!(d.to_string()),
        Some(Value::DateTime(dt)) => serde_json::json!(format_date_time(dt)),
        Some(Value::Lookup(lv)) => lv.to_json(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use time::macros::datetime;

    #[test]
    fn lookup_value_type_follows_key_space() {
        assert_eq!(
            Value::Lookup(LookupValue::integer(101, "Germany")).field_type(),
            FieldType::IntegerLookup
        );
        assert_eq!(
            Value::Lookup(LookupValue::text("DE", "Germany")).field_type(),
            FieldType::TextLookup
        );
    }

    #[test]
    fn display_string_uses_ui_forms() {
        assert_eq!(Value::Boolean(true).display_string(), "Yes");
        assert_eq!(Value::Boolean(false).to_string(), "false");
        assert_eq!(
            Value::Lookup(LookupValue::text("DE", "Germany")).display_string(),
            "Germany"
        );
    }

    #[test]
    fn json_keeps_decimal_scale() {
        let d = Decimal::from_str("12.50").unwrap();
        assert_eq!(
            value_to_json(Some(&Value::Decimal(d))),
            serde_json::json!("12.50")
        );
        assert_eq!(value_to_json(None), serde_json::Value::Null);
    }

    #[test]
    fn json_renders_date_time_and_lookup() {
        let dt = datetime!(2024-01-15 10:30:00 UTC);
        assert_eq!(
            value_to_json(Some(&Value::DateTime(dt))),
            serde_json::json!("2024-01-15T10:30:00Z")
        );
        assert_eq!(
            value_to_json(Some(&Value::Lookup(LookupValue::integer(7, "Seven")))),
            serde_json::json!({ "key": 7, "display": "Seven" })
        );
    }

    #[test]
    fn field_type_names_round_trip_through_serde() {
        let ft: FieldType = serde_json::from_value(serde_json::json!("integer_lookup")).unwrap();
        assert_eq!(ft, FieldType::IntegerLookup);
        assert!(ft.is_lookup());
        assert!(ft.is_numeric_lookup());
        assert_eq!(ft.to_string(), "integer_lookup");
    }
}
