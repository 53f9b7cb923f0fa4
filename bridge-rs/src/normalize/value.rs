//! JSON-safe values produced by flattening

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// A native scalar unwrapped from a remote object
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    String(String),
    Bool(bool),
    Integer(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// The only value type that leaves the bridge
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FlattenedValue {
    /// A property that was present but empty on the remote side
    Null,
    Scalar(Scalar),
    List(Vec<FlattenedValue>),
    Map(BTreeMap<String, FlattenedValue>),
}

impl FlattenedValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self::Scalar(Scalar::String(value.into()))
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, FlattenedValue>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FlattenedValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Look up a key of a map value
    pub fn get(&self, key: &str) -> Option<&FlattenedValue> {
        self.as_map().and_then(|map| map.get(key))
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_serializes_to_plain_json() {
        let when = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let value = FlattenedValue::Map(BTreeMap::from([
            ("Name".to_string(), FlattenedValue::string("alice")),
            ("Enabled".to_string(), FlattenedValue::Scalar(Scalar::Bool(true))),
            ("Size".to_string(), FlattenedValue::Scalar(Scalar::Integer(12))),
            ("Created".to_string(), FlattenedValue::Scalar(Scalar::Timestamp(when))),
            ("Aliases".to_string(), FlattenedValue::List(vec![FlattenedValue::string("a")])),
            ("Manager".to_string(), FlattenedValue::Null),
        ]));

        assert_eq!(
            value.to_json(),
            json!({
                "Name": "alice",
                "Enabled": true,
                "Size": 12,
                "Created": "2024-03-01T12:00:00Z",
                "Aliases": ["a"],
                "Manager": null,
            })
        );
    }
}
