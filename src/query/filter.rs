//! Structured filters handed to the store

use crate::core::ids::ObjectId;
use crate::core::timestamp::format_timestamp;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Comparison operators the store understands
pub const KNOWN_OPERATORS: [&str; 6] = ["eq", "ne", "lt", "gt", "lte", "gte"];

/// A filter operand, raw or already coerced to its typed form
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
    ObjectId(ObjectId),
    Timestamp(DateTime<Utc>),
    Other(Value),
}

impl FilterValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => FilterValue::Text(s.clone()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FilterValue::Integer(i),
                None => FilterValue::Other(value.clone()),
            },
            other => FilterValue::Other(other.clone()),
        }
    }

    /// Document representation: identifiers and timestamps as strings
    pub fn to_json(&self) -> Value {
        match self {
            FilterValue::Text(s) => Value::String(s.clone()),
            FilterValue::Integer(i) => Value::from(*i),
            FilterValue::ObjectId(id) => Value::String(id.to_hex()),
            FilterValue::Timestamp(ts) => Value::String(format_timestamp(ts)),
            FilterValue::Other(v) => v.clone(),
        }
    }
}

impl Serialize for FilterValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Text(s) => f.write_str(s),
            FilterValue::Integer(i) => write!(f, "{}", i),
            FilterValue::ObjectId(id) => write!(f, "ObjectId({})", id),
            FilterValue::Timestamp(ts) => write!(f, "{}", format_timestamp(ts)),
            FilterValue::Other(v) => write!(f, "{}", v),
        }
    }
}

/// Condition on a single field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Condition {
    /// `{field: value}`
    Eq(FilterValue),
    /// `{field: {operator: value, ...}}`
    Ops(BTreeMap<String, FilterValue>),
}

/// Field path to condition; every condition must hold
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Filter(pub BTreeMap<String, Condition>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Condition> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, condition: Condition) {
        self.0.insert(field.into(), condition);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Condition)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flat parameter form: plain fields as values, operator conditions
    /// as nested objects. Translating it again gives back this filter.
    pub fn to_params(&self) -> Vec<(String, Value)> {
        self.0
            .iter()
            .map(|(field, condition)| {
                let value = match condition {
                    Condition::Eq(v) => v.to_json(),
                    Condition::Ops(ops) => Value::Object(
                        ops.iter().map(|(op, v)| (op.clone(), v.to_json())).collect(),
                    ),
                };
                (field.clone(), value)
            })
            .collect()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, condition) in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            match condition {
                Condition::Eq(v) => write!(f, "{} = {}", field, v)?,
                Condition::Ops(ops) => {
                    let parts: Vec<_> = ops.iter().map(|(op, v)| format!("{} {}", op, v)).collect();
                    write!(f, "{} {{{}}}", field, parts.join(", "))?;
                }
            }
        }
        Ok(())
    }
}
