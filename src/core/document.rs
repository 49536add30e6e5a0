//! Field-by-field document reading that collects every error

use crate::core::error::FieldError;
use crate::core::ids::ObjectId;
use crate::core::timestamp::parse_timestamp;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Free-form JSON object payload
pub type DataMap = Map<String, Value>;

/// Which URL schemes a field accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    /// Any scheme, e.g. `git://`, `https://`
    Any,
    /// `http://` or `https://` only
    Http,
}

fn url_regex() -> &'static Regex {
    static URL: OnceLock<Regex> = OnceLock::new();
    URL.get_or_init(|| {
        Regex::new(r"^(?P<scheme>[A-Za-z][A-Za-z0-9+.\-]*)://(?P<host>[^/?#\s]*)(?P<rest>[^\s]*)$")
            .expect("static URL pattern")
    })
}

/// Check that `value` is a well-formed URL of the given kind
pub fn check_url(value: &str, kind: UrlKind) -> Result<(), String> {
    let caps = url_regex()
        .captures(value)
        .ok_or_else(|| format!("'{}' is not a valid URL", value))?;

    let scheme = caps["scheme"].to_ascii_lowercase();
    if kind == UrlKind::Http && scheme != "http" && scheme != "https" {
        return Err(format!("URL scheme should be 'http' or 'https', got '{}'", scheme));
    }

    let host = &caps["host"];
    let host = host.rsplit('@').next().unwrap_or(host);
    if host.is_empty() && scheme != "file" {
        return Err(format!("'{}' has no host", value));
    }
    Ok(())
}

/// Reads typed fields out of a JSON object, recording every failure
/// under its full dotted path instead of stopping at the first one.
pub struct DocReader<'a> {
    doc: &'a DataMap,
    prefix: String,
    errors: &'a mut Vec<FieldError>,
}

impl<'a> DocReader<'a> {
    pub fn new(doc: &'a DataMap, prefix: &str, errors: &'a mut Vec<FieldError>) -> Self {
        Self {
            doc,
            prefix: prefix.to_string(),
            errors,
        }
    }

    pub fn path(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.prefix, key)
        }
    }

    pub fn error(&mut self, key: &str, message: impl Into<String>) {
        let field = self.path(key);
        self.errors.push(FieldError::new(field, message));
    }

    /// Raw value of a field, treating explicit nulls as absent
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        let doc: &'a DataMap = self.doc;
        doc.get(key).filter(|v| !v.is_null())
    }

    pub fn optional<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                self.error(key, e.to_string());
                None
            }
        }
    }

    pub fn required<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        if self.get(key).is_none() {
            self.error(key, "field required");
            return None;
        }
        self.optional(key)
    }

    /// Optional field falling back to its default when absent or invalid
    pub fn or_default<T: DeserializeOwned + Default>(&mut self, key: &str) -> T {
        self.optional(key).unwrap_or_default()
    }

    /// Integer field that must be a JSON integer, not a float or string
    pub fn strict_int(&mut self, key: &str, required: bool) -> Option<i64> {
        let Some(value) = self.get(key) else {
            if required {
                self.error(key, "field required");
            }
            return None;
        };
        match value.as_i64() {
            Some(n) => Some(n),
            None => {
                self.error(key, format!("expected an integer, got {}", value));
                None
            }
        }
    }

    pub fn object(&mut self, key: &str) -> DataMap {
        match self.get(key) {
            None => DataMap::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                self.error(key, format!("expected an object, got {}", other));
                DataMap::new()
            }
        }
    }

    pub fn timestamp(&mut self, key: &str) -> Option<DateTime<Utc>> {
        let value = self.get(key)?;
        let parsed = value.as_str().and_then(parse_timestamp);
        if parsed.is_none() {
            self.error(key, format!("invalid ISO-8601 timestamp: {}", value));
        }
        parsed
    }

    pub fn object_id(&mut self, key: &str) -> Option<ObjectId> {
        let value = self.get(key)?;
        let parsed = match value.as_str() {
            Some(raw) => ObjectId::parse_str(raw).map_err(|e| e.to_string()),
            None => Err(format!("expected an identifier string, got {}", value)),
        };
        match parsed {
            Ok(id) => Some(id),
            Err(e) => {
                self.error(key, format!("invalid identifier: {}", e));
                None
            }
        }
    }

    pub fn object_ids(&mut self, key: &str) -> Vec<ObjectId> {
        let Some(value) = self.get(key) else {
            return Vec::new();
        };
        let Some(items) = value.as_array() else {
            self.error(key, format!("expected a list of identifiers, got {}", value));
            return Vec::new();
        };

        let mut ids = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match item.as_str().map(ObjectId::parse_str) {
                Some(Ok(id)) => ids.push(id),
                _ => self.error(&format!("{}.{}", key, i), format!("invalid identifier: {}", item)),
            }
        }
        ids
    }

    pub fn url(&mut self, key: &str, kind: UrlKind, required: bool) -> Option<String> {
        let raw: String = if required {
            self.required(key)?
        } else {
            self.optional(key)?
        };
        match check_url(&raw, kind) {
            Ok(()) => Some(raw),
            Err(e) => {
                self.error(key, e);
                None
            }
        }
    }

    /// Read a nested object with its own reader; errors are reported
    /// under `prefix.key.*`
    pub fn nested<T: FromDocument>(&mut self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        let Some(map) = value.as_object() else {
            self.error(key, format!("expected an object, got {}", value));
            return None;
        };
        let prefix = self.path(key);
        let mut reader = DocReader {
            doc: map,
            prefix,
            errors: &mut *self.errors,
        };
        T::read(&mut reader)
    }
}

/// Types that can be read from a JSON object via [`DocReader`]
pub trait FromDocument: Sized {
    /// Returns `None` when any required field failed; the failures are
    /// already recorded on the reader.
    fn read(reader: &mut DocReader<'_>) -> Option<Self>;
}

impl FromDocument for DataMap {
    fn read(reader: &mut DocReader<'_>) -> Option<Self> {
        Some(reader.doc.clone())
    }
}

/// Remove `null` members from objects, recursively
pub fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}
