//! Pub/sub event payloads and their stored history

use crate::core::config::Clock;
use crate::core::document::{DataMap, DocReader, FromDocument};
use crate::core::error::{FieldError, ValidationError};
use crate::core::ids::ObjectId;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Whether a value counts as present for event payloads
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Event submitted for publication on a channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishEvent {
    /// Event payload, must not be empty
    pub data: Value,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub source: Option<String>,
    /// Extra CloudEvents attributes
    pub attributes: Option<BTreeMap<String, String>>,
}

impl FromDocument for PublishEvent {
    fn read(reader: &mut DocReader<'_>) -> Option<Self> {
        let data = match reader.get("data") {
            Some(value) if is_truthy(value) => Some(value.clone()),
            Some(_) => {
                reader.error("data", "Provide data for the event");
                None
            }
            None => {
                reader.error("data", "field required");
                None
            }
        };
        let event_type = reader.optional("type");
        let source = reader.optional("source");
        let attributes = reader.optional("attributes");

        Some(PublishEvent {
            data: data?,
            event_type,
            source,
            attributes,
        })
    }
}

impl PublishEvent {
    pub fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let Some(map) = value.as_object() else {
            return Err(ValidationError::new(
                "event",
                vec![FieldError::new("", format!("expected a JSON object, got {}", value))],
            ));
        };
        let mut errors = Vec::new();
        let mut reader = DocReader::new(map, "", &mut errors);
        let event = PublishEvent::read(&mut reader);
        match event {
            Some(event) if errors.is_empty() => Ok(event),
            _ => Err(ValidationError::new("event", errors)),
        }
    }
}

/// A published event kept for replay until its retention window passes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventHistory {
    pub id: Option<ObjectId>,
    pub timestamp: DateTime<Utc>,
    pub data: DataMap,
}

impl EventHistory {
    pub fn new(data: DataMap, clock: &dyn Clock) -> Self {
        Self {
            id: None,
            timestamp: clock.now(),
            data,
        }
    }

    pub fn expires_at(&self, retention: Duration) -> DateTime<Utc> {
        self.timestamp
            .checked_add_signed(retention)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        now >= self.expires_at(retention)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::FixedClock;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_event_requires_data() {
        for empty in [json!(null), json!(false), json!(0), json!(""), json!([]), json!({})] {
            let err = PublishEvent::from_value(&json!({"data": empty})).unwrap_err();
            assert!(err.has_field("data"), "{:?} should be rejected", empty);
        }
        assert!(PublishEvent::from_value(&json!({"type": "x"})).is_err());
    }

    #[test]
    fn test_event_with_attributes() {
        let event = PublishEvent::from_value(&json!({
            "data": {"op": "created", "id": "65a1f2c3d4e5f6a7b8c9d0e1"},
            "type": "api.kernelci.org",
            "attributes": {"kind": "checkout"}
        }))
        .unwrap();
        assert_eq!(event.event_type.as_deref(), Some("api.kernelci.org"));
        assert_eq!(event.attributes.unwrap()["kind"], "checkout");

        let rendered = serde_json::to_value(PublishEvent::from_value(&json!({"data": 1})).unwrap()).unwrap();
        assert!(rendered.get("type").is_some());
    }

    #[test]
    fn test_history_expiry() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        let event = EventHistory::new(DataMap::new(), &clock);
        let retention = Duration::hours(24);

        assert_eq!(event.expires_at(retention), clock.0 + retention);
        assert!(!event.is_expired(clock.0 + Duration::hours(23), retention));
        assert!(event.is_expired(clock.0 + Duration::hours(24), retention));
    }
}
