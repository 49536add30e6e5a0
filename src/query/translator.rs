//! Translation of flat filter parameters into typed store filters

use crate::core::error::{CoercionError, ModelError, TranslationError};
use crate::core::schema::{FieldSets, Schema};
use crate::query::coerce::coerce_value;
use crate::query::filter::{Condition, Filter, FilterValue, KNOWN_OPERATORS};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Split `field__operator`. Keys with no separator, or more than one, are
/// plain field names.
pub fn split_operator(key: &str) -> Option<(&str, &str)> {
    let mut parts = key.split("__");
    match (parts.next(), parts.next(), parts.next()) {
        (Some(field), Some(op), None) => Some((field, op)),
        _ => None,
    }
}

/// Translates client filter parameters for one node kind
#[derive(Debug, Clone, Copy)]
pub struct QueryTranslator<'a> {
    fields: &'a FieldSets,
    strict_operators: bool,
}

impl<'a> QueryTranslator<'a> {
    pub fn new(fields: &'a FieldSets, strict_operators: bool) -> Self {
        Self {
            fields,
            strict_operators,
        }
    }

    /// Extract operators, then coerce designated fields
    pub fn translate<I, K>(&self, params: I) -> Result<Filter, ModelError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let filter = self.extract_operators(params)?;
        Ok(self.coerce(filter)?)
    }

    /// Group `field__op` keys into one operator map per field
    pub fn extract_operators<I, K>(&self, params: I) -> Result<Filter, TranslationError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut filter = Filter::new();

        for (key, value) in params {
            let key = key.as_ref();
            match split_operator(key) {
                Some((field, op)) => {
                    self.check_operator(field, op)?;
                    debug!("Extracted operator {} on {}", op, field);
                    let mut ops = BTreeMap::new();
                    ops.insert(op.to_string(), FilterValue::from_json(&value));
                    merge(&mut filter, field, Condition::Ops(ops))?;
                }
                None => {
                    let condition = match &value {
                        Value::Object(nested) => {
                            let mut ops = BTreeMap::new();
                            for (op, v) in nested {
                                self.check_operator(key, op)?;
                                ops.insert(op.clone(), FilterValue::from_json(v));
                            }
                            Condition::Ops(ops)
                        }
                        other => Condition::Eq(FilterValue::from_json(other)),
                    };
                    merge(&mut filter, key, condition)?;
                }
            }
        }

        Ok(filter)
    }

    /// Convert values of designated fields, keeping operator nesting
    pub fn coerce(&self, filter: Filter) -> Result<Filter, CoercionError> {
        let mut out = Filter::new();

        for (field, condition) in filter.0 {
            let Some(coercion) = self.fields.coercion_for(&field) else {
                out.insert(field, condition);
                continue;
            };

            let coerced = match condition {
                Condition::Eq(value) => Condition::Eq(coerce_value(&field, coercion, &value)?),
                Condition::Ops(ops) => {
                    let mut typed = BTreeMap::new();
                    for (op, value) in ops {
                        let value = coerce_value(&field, coercion, &value)?;
                        typed.insert(op, value);
                    }
                    Condition::Ops(typed)
                }
            };
            out.insert(field, coerced);
        }

        Ok(out)
    }

    fn check_operator(&self, field: &str, op: &str) -> Result<(), TranslationError> {
        if KNOWN_OPERATORS.contains(&op) {
            return Ok(());
        }
        if self.strict_operators {
            return Err(TranslationError::UnknownOperator {
                field: field.to_string(),
                operator: op.to_string(),
            });
        }
        debug!("Passing unknown operator {} on {} to the store", op, field);
        Ok(())
    }
}

fn merge(filter: &mut Filter, field: &str, condition: Condition) -> Result<(), TranslationError> {
    let conflict = || TranslationError::ConflictingFilter {
        field: field.to_string(),
    };

    if !filter.0.contains_key(field) {
        filter.insert(field, condition);
        return Ok(());
    }

    match (filter.0.get_mut(field), condition) {
        (Some(Condition::Ops(existing)), Condition::Ops(ops)) => {
            existing.extend(ops);
            Ok(())
        }
        (Some(Condition::Eq(existing)), Condition::Eq(value)) => {
            *existing = value;
            Ok(())
        }
        _ => Err(conflict()),
    }
}

impl Schema {
    /// Translate filter parameters against the designated fields of
    /// `kind` (the base fields when no kind is given)
    pub fn translate<I, K>(&self, kind: Option<&str>, params: I) -> Result<Filter, ModelError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let fields = self.field_sets(kind)?;
        QueryTranslator::new(fields, self.config().strict_operators).translate(params)
    }
}
