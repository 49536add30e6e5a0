//! Evaluation of translated filters against stored documents

use crate::core::ids::ObjectId;
use crate::core::timestamp::parse_timestamp;
use crate::persistence::StoreError;
use crate::query::{Condition, Filter, FilterValue, KNOWN_OPERATORS};
use serde_json::Value;
use std::cmp::Ordering;

/// Follow a dot-separated path through nested objects
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(doc, |current, key| current.as_object()?.get(key))
        .filter(|v| !v.is_null())
}

/// Order a stored value against a filter operand; `None` when the two
/// cannot be compared
fn compare(stored: &Value, operand: &FilterValue) -> Option<Ordering> {
    match operand {
        FilterValue::Text(s) => Some(stored.as_str()?.cmp(s.as_str())),
        FilterValue::Integer(n) => match stored.as_i64() {
            Some(i) => Some(i.cmp(n)),
            None => stored.as_f64()?.partial_cmp(&(*n as f64)),
        },
        FilterValue::ObjectId(id) => Some(ObjectId::parse_str(stored.as_str()?).ok()?.cmp(id)),
        FilterValue::Timestamp(ts) => Some(parse_timestamp(stored.as_str()?)?.cmp(ts)),
        FilterValue::Other(expected) => match (stored, expected) {
            (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (a, b) if a == b => Some(Ordering::Equal),
            _ => None,
        },
    }
}

/// Test a single value, or any element of an array value
fn any_value(stored: &Value, test: impl Fn(&Value) -> bool) -> bool {
    match stored {
        Value::Array(items) => items.iter().any(&test) || test(stored),
        other => test(other),
    }
}

fn apply(field: &str, stored: Option<&Value>, op: &str, operand: &FilterValue) -> Result<bool, StoreError> {
    let ordered = |accept: fn(Ordering) -> bool| {
        stored
            .map(|v| any_value(v, |item| compare(item, operand).map(accept).unwrap_or(false)))
            .unwrap_or(false)
    };

    let result = match op {
        "eq" => ordered(|o| o == Ordering::Equal),
        "ne" => !ordered(|o| o == Ordering::Equal),
        "lt" => ordered(|o| o == Ordering::Less),
        "gt" => ordered(|o| o == Ordering::Greater),
        "lte" => ordered(|o| o != Ordering::Greater),
        "gte" => ordered(|o| o != Ordering::Less),
        other => {
            return Err(StoreError::UnsupportedOperator {
                field: field.to_string(),
                operator: other.to_string(),
            })
        }
    };
    Ok(result)
}

/// Reject a filter naming an operator the store cannot evaluate,
/// independent of any stored document
pub fn check_operators(filter: &Filter) -> Result<(), StoreError> {
    for (field, condition) in filter.iter() {
        if let Condition::Ops(ops) = condition {
            if let Some(op) = ops.keys().find(|op| !KNOWN_OPERATORS.contains(&op.as_str())) {
                return Err(StoreError::UnsupportedOperator {
                    field: field.to_string(),
                    operator: op.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Check whether `doc` satisfies every condition of `filter`
pub fn matches(doc: &Value, filter: &Filter) -> Result<bool, StoreError> {
    check_operators(filter)?;
    for (field, condition) in filter.iter() {
        let stored = lookup(doc, field);
        let satisfied = match condition {
            Condition::Eq(operand) => apply(field, stored, "eq", operand)?,
            Condition::Ops(ops) => {
                let mut all = true;
                for (op, operand) in ops {
                    all &= apply(field, stored, op, operand)?;
                }
                all
            }
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::Schema;
    use serde_json::json;

    fn doc() -> Value {
        json!({
            "id": "65a1f2c3d4e5f6a7b8c9d0e1",
            "kind": "kbuild",
            "name": "kbuild-gcc-12-arm64",
            "path": ["checkout", "kbuild-gcc-12-arm64"],
            "state": "done",
            "created": "2024-03-10T08:30:00Z",
            "group": null,
            "data": {"arch": "arm64", "kernel_revision": {"version": {"version": 6, "patchlevel": 8}}}
        })
    }

    fn check(params: Value) -> bool {
        let params: Vec<(String, Value)> = params.as_object().unwrap().clone().into_iter().collect();
        let filter = Schema::with_defaults().translate(Some("kbuild"), params).unwrap();
        matches(&doc(), &filter).unwrap()
    }

    #[test]
    fn test_lookup_nested_paths() {
        let doc = doc();
        assert_eq!(lookup(&doc, "data.arch"), Some(&json!("arm64")));
        assert_eq!(lookup(&doc, "data.kernel_revision.version.version"), Some(&json!(6)));
        assert!(lookup(&doc, "data.missing.field").is_none());
        assert!(lookup(&doc, "group").is_none());
    }

    #[test]
    fn test_equality_and_operators() {
        assert!(check(json!({"state": "done", "data.arch": "arm64"})));
        assert!(!check(json!({"state": "running"})));
        assert!(check(json!({"created__gte": "2024-03-01", "created__lt": "2024-04-01T00:00:00"})));
        assert!(!check(json!({"created__gt": "2024-03-10T08:30:00"})));
        assert!(check(json!({"data.kernel_revision.version.version__gte": "6"})));
        assert!(check(json!({"id": "65a1f2c3d4e5f6a7b8c9d0e1"})));
    }

    #[test]
    fn test_arrays_match_any_element() {
        assert!(check(json!({"path": "checkout"})));
        assert!(!check(json!({"path__ne": "checkout"})));
    }

    #[test]
    fn test_missing_fields() {
        assert!(check(json!({"group__ne": "baseline"})));
        assert!(!check(json!({"group": "baseline"})));
        assert!(!check(json!({"data.platform__lt": "z"})));
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let filter = Schema::with_defaults()
            .translate(None, vec![("name__regex", json!("^kbuild"))])
            .unwrap();
        let err = matches(&doc(), &filter).unwrap_err();
        assert_eq!(
            err,
            StoreError::UnsupportedOperator {
                field: "name".to_string(),
                operator: "regex".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_operator_rejected_after_failed_condition() {
        let filter = Schema::with_defaults()
            .translate(None, vec![("kind", json!("checkout")), ("state__regex", json!("^d"))])
            .unwrap();
        assert!(check_operators(&filter).is_err());
        let err = matches(&doc(), &filter).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedOperator { ref field, .. } if field == "state"));
    }
}
