//! Per-document logic expressions for the mandatory, readonly and display
//! rules of a field.
//!
//! Descriptors hold the expression; each document evaluates it against its
//! own field values, so the same descriptor yields different flags in
//! different documents.

use std::collections::BTreeSet;

use webdoc_core::{LookupKey, Value};

use crate::error::DescriptorError;

/// Read access to field values for expression evaluation.
pub trait LogicContext {
    fn field_value(&self, field_name: &str) -> Option<&Value>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicExpr {
    Constant(bool),
    /// True when the field holds a value.
    IsSet(String),
    /// True when the field's value, rendered as text, equals `value`.
    /// Lookup values compare by key, booleans as `Y`/`N`.
    Equals { field: String, value: String },
    Not(Box<LogicExpr>),
    And(Vec<LogicExpr>),
    Or(Vec<LogicExpr>),
}

impl LogicExpr {
    pub const TRUE: LogicExpr = LogicExpr::Constant(true);
    pub const FALSE: LogicExpr = LogicExpr::Constant(false);

    pub fn evaluate(&self, ctx: &dyn LogicContext) -> bool {
        match self {
            LogicExpr::Constant(b) => *b,
            LogicExpr::IsSet(field) => ctx.field_value(field).is_some(),
            LogicExpr::Equals { field, value } => ctx
                .field_value(field)
                .map(|v| comparable_text(v) == *value)
                .unwrap_or(false),
            LogicExpr::Not(inner) => !inner.evaluate(ctx),
            LogicExpr::And(items) => items.iter().all(|e| e.evaluate(ctx)),
            LogicExpr::Or(items) => items.iter().any(|e| e.evaluate(ctx)),
        }
    }

    /// Constant value, if the expression does not depend on any field.
    pub fn as_constant(&self) -> Option<bool> {
        match self {
            LogicExpr::Constant(b) => Some(*b),
            _ => None,
        }
    }

    /// Names of all fields the expression reads.
    pub fn referenced_fields(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields(&self, out: &mut BTreeSet<String>) {
        match self {
            LogicExpr::Constant(_) => {}
            LogicExpr::IsSet(field) | LogicExpr::Equals { field, .. } => {
                out.insert(field.clone());
            }
            LogicExpr::Not(inner) => inner.collect_fields(out),
            LogicExpr::And(items) | LogicExpr::Or(items) => {
                for item in items {
                    item.collect_fields(out);
                }
            }
        }
    }

    /// Parse an expression from descriptor JSON.
    ///
    /// Accepted forms: `true`/`false`, `{"set": "F"}`,
    /// `{"field": "F", "equals": "Y"}`, `{"not": expr}`, `{"and": [..]}`,
    /// `{"or": [..]}`.
    pub fn from_json(v: &serde_json::Value) -> Result<LogicExpr, DescriptorError> {
        if let Some(b) = v.as_bool() {
            return Ok(LogicExpr::Constant(b));
        }
        let obj = v.as_object().ok_or_else(|| DescriptorError::Invalid {
            message: format!("logic expression must be a boolean or an object, got {}", v),
        })?;
        if let Some(field) = obj.get("set") {
            return Ok(LogicExpr::IsSet(expect_str(field, "set")?));
        }
        if let Some(field) = obj.get("field") {
            let expected = obj.get("equals").ok_or_else(|| DescriptorError::Invalid {
                message: "field comparison missing 'equals'".to_string(),
            })?;
            let value = match expected {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Bool(true) => "Y".to_string(),
                serde_json::Value::Bool(false) => "N".to_string(),
                other => other.to_string(),
            };
            return Ok(LogicExpr::Equals {
                field: expect_str(field, "field")?,
                value,
            });
        }
        if let Some(inner) = obj.get("not") {
            return Ok(LogicExpr::Not(Box::new(LogicExpr::from_json(inner)?)));
        }
        if let Some(items) = obj.get("and") {
            return Ok(LogicExpr::And(parse_list(items, "and")?));
        }
        if let Some(items) = obj.get("or") {
            return Ok(LogicExpr::Or(parse_list(items, "or")?));
        }
        Err(DescriptorError::Invalid {
            message: format!("unrecognized logic expression: {}", v),
        })
    }
}

impl Default for LogicExpr {
    fn default() -> Self {
        LogicExpr::FALSE
    }
}

impl From<bool> for LogicExpr {
    fn from(b: bool) -> Self {
        LogicExpr::Constant(b)
    }
}

fn comparable_text(v: &Value) -> String {
    match v {
        Value::Boolean(true) => "Y".to_string(),
        Value::Boolean(false) => "N".to_string(),
        Value::Lookup(lv) => match lv.key() {
            LookupKey::Integer(i) => i.to_string(),
            LookupKey::Text(s) => s.clone(),
        },
        other => other.to_string(),
    }
}

fn expect_str(v: &serde_json::Value, what: &str) -> Result<String, DescriptorError> {
    v.as_str()
        .map(str::to_string)
        .ok_or_else(|| DescriptorError::Invalid {
            message: format!("'{}' must name a field", what),
        })
}

fn parse_list(v: &serde_json::Value, what: &str) -> Result<Vec<LogicExpr>, DescriptorError> {
    v.as_array()
        .ok_or_else(|| DescriptorError::Invalid {
            message: format!("'{}' must be a list of expressions", what),
        })?
        .iter()
        .map(LogicExpr::from_json)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use webdoc_core::LookupValue;

    struct Values(BTreeMap<String, Value>);

    impl LogicContext for Values {
        fn field_value(&self, field_name: &str) -> Option<&Value> {
            self.0.get(field_name)
        }
    }

    fn ctx(entries: &[(&str, Value)]) -> Values {
        Values(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn equals_compares_lookup_keys_and_boolean_flags() {
        let values = ctx(&[
            ("C_Country_ID", Value::Lookup(LookupValue::integer(101, "Germany"))),
            ("IsSOTrx", Value::Boolean(true)),
        ]);
        let expr = LogicExpr::from_json(&serde_json::json!({
            "and": [
                { "field": "C_Country_ID", "equals": 101 },
                { "field": "IsSOTrx", "equals": true }
            ]
        }))
        .unwrap();
        assert!(expr.evaluate(&values));
    }

    #[test]
    fn is_set_and_not() {
        let values = ctx(&[("Description", Value::Text("x".into()))]);
        let expr = LogicExpr::from_json(&serde_json::json!({ "not": { "set": "Description" } }))
            .unwrap();
        assert!(!expr.evaluate(&values));
        assert!(!LogicExpr::IsSet("Other".into()).evaluate(&values));
    }

    #[test]
    fn referenced_fields_walks_the_tree() {
        let expr = LogicExpr::Or(vec![
            LogicExpr::IsSet("A".into()),
            LogicExpr::Not(Box::new(LogicExpr::Equals {
                field: "B".into(),
                value: "Y".into(),
            })),
            LogicExpr::TRUE,
        ]);
        let fields: Vec<String> = expr.referenced_fields().into_iter().collect();
        assert_eq!(fields, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn rejects_unknown_shapes() {
        assert!(LogicExpr::from_json(&serde_json::json!("Y")).is_err());
        assert!(LogicExpr::from_json(&serde_json::json!({ "xor": [] })).is_err());
    }
}
