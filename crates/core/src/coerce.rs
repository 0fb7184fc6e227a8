//! Raw value coercion.
//!
//! `coerce` maps a [`RawValue`] onto a field's declared [`FieldType`]. Null
//! always maps to `None`. A value whose representation already satisfies the
//! target passes through unchanged; every other (target, representation)
//! pair is decided by the rule table below, and pairs without a rule fail.
//!
//! | target          | accepted                    |
//! |-----------------|-----------------------------|
//! | text            | anything but mappings       |
//! | boolean         | anything                    |
//! | integer         | text, numbers               |
//! | decimal         | text                        |
//! | date_time       | text                        |
//! | text_lookup     | text, key/display mapping   |
//! | integer_lookup  | text, numbers, mapping      |
//!
//! Empty or blank text maps to `None` for every target except text and
//! boolean. Numeric and date/time parses trim surrounding whitespace; lookup
//! identifiers are passed to the resolver as given.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::error::FieldError;
use crate::lookup::LookupBinding;
use crate::raw::RawValue;
use crate::values::{FieldType, LookupKey, LookupValue, Value};

/// Mapping entries recognised when building a lookup value directly.
const MAPPING_KEY: &str = "key";
const MAPPING_DISPLAY: &[&str] = &["display", "caption"];

/// Why a rule did not produce a value.
enum Rejection {
    NoRule(&'static str),
    Failed(String),
}

impl Rejection {
    fn into_reason(self) -> String {
        match self {
            Rejection::NoRule(why) => why.to_string(),
            Rejection::Failed(why) => why,
        }
    }
}

type RuleResult = Result<Option<Value>, Rejection>;

/// The representation of a non-null raw value, with typed values unwrapped
/// into the representation they carry.
enum Repr<'a> {
    Text(&'a str),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    Boolean(bool),
    DateTime(OffsetDateTime),
    Mapping(&'a BTreeMap<String, String>),
    Lookup(&'a LookupValue),
}

fn repr(raw: &RawValue) -> Option<Repr<'_>> {
    Some(match raw {
        RawValue::Null => return None,
        RawValue::Text(s) => Repr::Text(s),
        RawValue::Integer(i) => Repr::Integer(*i),
        RawValue::Float(x) => Repr::Float(*x),
        RawValue::Boolean(b) => Repr::Boolean(*b),
        RawValue::DateTime(dt) => Repr::DateTime(*dt),
        RawValue::Mapping(m) => Repr::Mapping(m),
        RawValue::Typed(v) => match v {
            Value::Text(s) => Repr::Text(s),
            Value::Boolean(b) => Repr::Boolean(*b),
            Value::Integer(i) => Repr::Integer(*i),
            Value::Decimal(d) => Repr::Decimal(*d),
            Value::DateTime(dt) => Repr::DateTime(*dt),
            Value::Lookup(lv) => Repr::Lookup(lv),
        },
    })
}

/// Coerce `raw` into `target` for the field named `field_name`.
///
/// Lookup targets resolve text and numeric identifiers through `lookup`.
/// Requesting a lookup target without a binding is a contract violation and
/// fails instead of silently producing `None`.
pub fn coerce(
    field_name: &str,
    raw: &RawValue,
    target: FieldType,
    lookup: Option<&LookupBinding>,
) -> Result<Option<Value>, FieldError> {
    let repr = match repr(raw) {
        Some(r) => r,
        None => return Ok(None),
    };

    // Identity: already an instance of the target type.
    if let RawValue::Typed(v) = raw {
        if v.field_type() == target {
            return Ok(Some(v.clone()));
        }
    }

    let result = match target {
        FieldType::Text => to_text(repr),
        FieldType::Boolean => Ok(Some(Value::Boolean(to_bool(repr)))),
        FieldType::Integer => to_integer(repr),
        FieldType::Decimal => to_decimal(repr),
        FieldType::DateTime => to_date_time(repr),
        FieldType::TextLookup => to_text_lookup(repr, lookup),
        FieldType::IntegerLookup => to_integer_lookup(repr, lookup),
    };

    result.map_err(|rejection| FieldError::Conversion {
        field_name: field_name.to_string(),
        raw_value: raw.to_string(),
        representation: raw.representation(),
        target,
        reason: rejection.into_reason(),
    })
}

// ──────────────────────────────────────────────
// Rules
// ──────────────────────────────────────────────

fn to_text(repr: Repr<'_>) -> RuleResult {
    let s = match repr {
        // Serialized structures are never shown as text.
        Repr::Mapping(_) => return Err(Rejection::NoRule("mappings are not converted to text")),
        Repr::Text(s) => s.to_string(),
        Repr::Integer(i) => i.to_string(),
        Repr::Float(x) => x.to_string(),
        Repr::Decimal(d) => d.to_string(),
        Repr::Boolean(b) => b.to_string(),
        Repr::DateTime(dt) => Value::DateTime(dt).to_string(),
        Repr::Lookup(lv) => lv.display_name().to_string(),
    };
    Ok(Some(Value::Text(s)))
}

/// Truthy normalization; anything ambiguous is `false`.
fn to_bool(repr: Repr<'_>) -> bool {
    match repr {
        Repr::Boolean(b) => b,
        Repr::Text(s) => is_truthy(s),
        Repr::Integer(i) => i != 0,
        Repr::Float(x) => x != 0.0 && !x.is_nan(),
        Repr::Decimal(d) => !d.is_zero(),
        Repr::Lookup(lv) => match lv.key() {
            LookupKey::Text(k) => is_truthy(k),
            LookupKey::Integer(_) => false,
        },
        Repr::DateTime(_) | Repr::Mapping(_) => false,
    }
}

fn is_truthy(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "true" | "1"
    )
}

fn to_integer(repr: Repr<'_>) -> RuleResult {
    match repr {
        Repr::Integer(i) => Ok(Some(Value::Integer(i))),
        Repr::Text(s) => match non_empty(s) {
            None => Ok(None),
            Some(t) => parse_integer(t.trim()).map(|i| Some(Value::Integer(i))),
        },
        Repr::Float(x) => truncate_float(x).map(|i| Some(Value::Integer(i))),
        Repr::Decimal(d) => d
            .trunc()
            .to_i64()
            .map(|i| Some(Value::Integer(i)))
            .ok_or_else(|| Rejection::Failed(format!("{} is out of integer range", d))),
        Repr::Lookup(lv) => match lv.key() {
            LookupKey::Integer(i) => Ok(Some(Value::Integer(*i))),
            LookupKey::Text(_) => Err(Rejection::NoRule("text-keyed lookups have no integer form")),
        },
        Repr::Boolean(_) | Repr::DateTime(_) | Repr::Mapping(_) => {
            Err(Rejection::NoRule("no integer conversion rule"))
        }
    }
}

fn to_decimal(repr: Repr<'_>) -> RuleResult {
    match repr {
        Repr::Decimal(d) => Ok(Some(Value::Decimal(d))),
        Repr::Text(s) => match non_empty(s) {
            None => Ok(None),
            Some(t) => parse_decimal(t.trim()).map(|d| Some(Value::Decimal(d))),
        },
        Repr::Integer(_)
        | Repr::Float(_)
        | Repr::Boolean(_)
        | Repr::DateTime(_)
        | Repr::Mapping(_)
        | Repr::Lookup(_) => Err(Rejection::NoRule(
            "decimals are only parsed from their text form",
        )),
    }
}

fn to_date_time(repr: Repr<'_>) -> RuleResult {
    match repr {
        Repr::DateTime(dt) => Ok(Some(Value::DateTime(dt))),
        Repr::Text(s) => match non_empty(s) {
            None => Ok(None),
            Some(t) => parse_date_time(t.trim())
                .map(|dt| Some(Value::DateTime(dt)))
                .map_err(Rejection::Failed),
        },
        Repr::Integer(_)
        | Repr::Float(_)
        | Repr::Decimal(_)
        | Repr::Boolean(_)
        | Repr::Mapping(_)
        | Repr::Lookup(_) => Err(Rejection::NoRule("date/times are only parsed from text")),
    }
}

fn to_text_lookup(repr: Repr<'_>, lookup: Option<&LookupBinding>) -> RuleResult {
    match repr {
        Repr::Mapping(m) => lookup_from_mapping(m, false).map(|lv| Some(Value::Lookup(lv))),
        Repr::Text(s) => match non_empty(s) {
            None => Ok(None),
            Some(t) => resolve(lookup, LookupKey::Text(t.to_string())),
        },
        Repr::Lookup(_) => Err(Rejection::NoRule("lookup key space is not textual")),
        Repr::Integer(_)
        | Repr::Float(_)
        | Repr::Decimal(_)
        | Repr::Boolean(_)
        | Repr::DateTime(_) => Err(Rejection::NoRule("no text lookup conversion rule")),
    }
}

fn to_integer_lookup(repr: Repr<'_>, lookup: Option<&LookupBinding>) -> RuleResult {
    match repr {
        Repr::Mapping(m) => lookup_from_mapping(m, true).map(|lv| Some(Value::Lookup(lv))),
        Repr::Integer(i) => resolve(lookup, LookupKey::Integer(i)),
        Repr::Float(x) => resolve(lookup, LookupKey::Integer(truncate_float(x)?)),
        Repr::Text(s) => match non_empty(s) {
            None => Ok(None),
            Some(t) => resolve(lookup, LookupKey::Integer(parse_integer(t.trim())?)),
        },
        Repr::Lookup(_) => Err(Rejection::NoRule("lookup key space is not numeric")),
        Repr::Decimal(_) | Repr::Boolean(_) | Repr::DateTime(_) => {
            Err(Rejection::NoRule("no integer lookup conversion rule"))
        }
    }
}

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn non_empty(s: &str) -> Option<&str> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn parse_integer(s: &str) -> Result<i64, Rejection> {
    s.parse::<i64>()
        .map_err(|e| Rejection::Failed(format!("invalid integer: {}", e)))
}

fn truncate_float(x: f64) -> Result<i64, Rejection> {
    let t = x.trunc();
    if !t.is_finite() || t < i64::MIN as f64 || t >= i64::MAX as f64 {
        return Err(Rejection::Failed(format!("{} is out of integer range", x)));
    }
    Ok(t as i64)
}

/// Digits beyond what a `Decimal` can hold are an error, never rounded.
fn parse_decimal(s: &str) -> Result<Decimal, Rejection> {
    let parsed = match s.split_once(['e', 'E']) {
        None => Decimal::from_str_exact(s),
        Some((mantissa, _)) => {
            Decimal::from_str_exact(mantissa).and_then(|_| Decimal::from_scientific(s))
        }
    };
    parsed.map_err(|e| Rejection::Failed(format!("invalid decimal: {}", e)))
}

/// Parse an RFC 3339 date-time, an offset-less ISO date-time (taken as UTC),
/// or a plain ISO date (midnight UTC).
pub fn parse_date_time(s: &str) -> Result<OffsetDateTime, String> {
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(dt);
    }
    if let Ok(dt) = PrimitiveDateTime::parse(
        s,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Ok(dt.assume_utc());
    }
    Date::parse(s, format_description!("[year]-[month]-[day]"))
        .map(|d| d.midnight().assume_utc())
        .map_err(|e| format!("invalid ISO date/time: {}", e))
}

fn lookup_from_mapping(
    m: &BTreeMap<String, String>,
    numeric: bool,
) -> Result<LookupValue, Rejection> {
    let key = m
        .get(MAPPING_KEY)
        .ok_or_else(|| Rejection::Failed("mapping has no 'key' entry".to_string()))?;
    let display = MAPPING_DISPLAY
        .iter()
        .find_map(|name| m.get(*name))
        .cloned()
        .unwrap_or_default();
    let key = if numeric {
        LookupKey::Integer(parse_integer(key.trim())?)
    } else {
        LookupKey::Text(key.clone())
    };
    Ok(LookupValue::new(key, display))
}

/// Resolve an identifier through the binding; unknown identifiers yield `None`.
fn resolve(lookup: Option<&LookupBinding>, key: LookupKey) -> RuleResult {
    let binding = lookup.ok_or_else(|| {
        Rejection::Failed("no lookup data source is attached to the field".to_string())
    })?;
    match binding.find_by_id(&key) {
        Some(lv) => Ok(Some(Value::Lookup(lv))),
        None => {
            tracing::debug!(key = %key, "lookup identifier not found; storing no value");
            Ok(None)
        }
    }
}
