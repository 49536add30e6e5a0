//! Conversion of designated filter fields into typed values

use crate::core::error::CoercionError;
use crate::core::ids::ObjectId;
use crate::core::schema::Coercion;
use crate::core::timestamp::parse_timestamp;
use crate::query::filter::FilterValue;

impl Coercion {
    fn expected(&self) -> &'static str {
        match self {
            Coercion::ObjectId => "an object id",
            Coercion::Timestamp => "an ISO-8601 timestamp",
            Coercion::Integer => "an integer",
        }
    }
}

/// Convert `value` for `field`. Values already in the target form are
/// returned unchanged.
pub fn coerce_value(field: &str, coercion: Coercion, value: &FilterValue) -> Result<FilterValue, CoercionError> {
    let fail = || CoercionError {
        field: field.to_string(),
        value: value.to_string(),
        expected: coercion.expected(),
    };

    match (coercion, value) {
        (Coercion::ObjectId, FilterValue::ObjectId(_))
        | (Coercion::Timestamp, FilterValue::Timestamp(_))
        | (Coercion::Integer, FilterValue::Integer(_)) => Ok(value.clone()),

        (Coercion::ObjectId, FilterValue::Text(raw)) => ObjectId::parse_str(raw)
            .map(FilterValue::ObjectId)
            .map_err(|_| fail()),
        (Coercion::Timestamp, FilterValue::Text(raw)) => parse_timestamp(raw)
            .map(FilterValue::Timestamp)
            .ok_or_else(fail),
        (Coercion::Integer, FilterValue::Text(raw)) => raw
            .trim()
            .parse::<i64>()
            .map(FilterValue::Integer)
            .map_err(|_| fail()),

        _ => Err(fail()),
    }
}
