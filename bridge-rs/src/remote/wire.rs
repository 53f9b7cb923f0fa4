//! JSON representation of remote result objects
//!
//! This is the record format spoken by the management gateway and produced
//! by the mock connector.
//!
//! ```json
//! {"kind": "object", "text": "@{Name=alice}", "properties": [
//!     {"name": "Name", "value": {"kind": "string", "value": "alice"}},
//!     {"name": "Quota", "error": "property getter failed"}
//! ]}
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::record::{RawRecord, RecordProperty, RecordRef};
use crate::normalize::Scalar;

/// A remote object as carried over the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WireRecord {
    Null,
    String {
        value: String,
    },
    Bool {
        value: bool,
    },
    Int {
        value: i64,
    },
    Float {
        value: f64,
    },
    DateTime {
        value: DateTime<Utc>,
    },
    Guid {
        value: Uuid,
    },
    Enum {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<i64>,
    },
    Collection {
        #[serde(default)]
        items: Vec<Arc<WireRecord>>,
    },
    Object {
        /// How the remote shell renders the object
        #[serde(default)]
        text: String,
        #[serde(default, rename = "typeNames", skip_serializing_if = "Vec::is_empty")]
        type_names: Vec<String>,
        #[serde(default)]
        properties: Vec<WireProperty>,
    },
}

/// One property of a [`WireRecord::Object`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireProperty {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Arc<WireRecord>>,
    /// Set when the remote side could not read the property
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WireRecord {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String {
            value: value.into(),
        }
    }

    pub fn int(value: i64) -> Self {
        Self::Int { value }
    }

    pub fn bool(value: bool) -> Self {
        Self::Bool { value }
    }

    pub fn collection(items: Vec<WireRecord>) -> Self {
        Self::Collection {
            items: items.into_iter().map(Arc::new).collect(),
        }
    }

    /// Build an object whose rendering lists its properties, `@{A=1; B=2}`
    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, WireRecord)>,
        K: Into<String>,
    {
        let properties: Vec<WireProperty> = properties
            .into_iter()
            .map(|(name, value)| WireProperty {
                name: name.into(),
                value: Some(Arc::new(value)),
                error: None,
            })
            .collect();

        let text = format!(
            "@{{{}}}",
            properties
                .iter()
                .map(|p| {
                    let rendered = p.value.as_ref().map(|v| v.render()).unwrap_or_default();
                    format!("{}={}", p.name, rendered)
                })
                .collect::<Vec<_>>()
                .join("; ")
        );

        Self::Object {
            text,
            type_names: Vec::new(),
            properties,
        }
    }

    /// Build an object with an explicit rendering
    pub fn rendered_object(text: impl Into<String>, properties: Vec<WireProperty>) -> Self {
        Self::Object {
            text: text.into(),
            type_names: Vec::new(),
            properties,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Property value of an object record
    pub fn property(&self, name: &str) -> Option<&WireRecord> {
        match self {
            Self::Object { properties, .. } => properties
                .iter()
                .find(|p| p.name.eq_ignore_ascii_case(name))
                .and_then(|p| p.value.as_deref()),
            _ => None,
        }
    }
}

impl RawRecord for WireRecord {
    fn render(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::String { value } => value.clone(),
            Self::Bool { value: true } => "True".to_string(),
            Self::Bool { value: false } => "False".to_string(),
            Self::Int { value } => value.to_string(),
            Self::Float { value } => value.to_string(),
            Self::DateTime { value } => value.to_rfc3339_opts(SecondsFormat::Secs, true),
            Self::Guid { value } => value.to_string(),
            Self::Enum { name, .. } => name.clone(),
            Self::Collection { items } => items
                .iter()
                .map(|item| item.render())
                .collect::<Vec<_>>()
                .join(" "),
            Self::Object { text, .. } => text.clone(),
        }
    }

    fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Self::String { value } => Some(Scalar::String(value.clone())),
            Self::Bool { value } => Some(Scalar::Bool(*value)),
            Self::Int { value } => Some(Scalar::Integer(*value)),
            Self::Float { value } => Some(Scalar::Float(*value)),
            Self::DateTime { value } => Some(Scalar::Timestamp(*value)),
            Self::Guid { value } => Some(Scalar::String(value.to_string())),
            _ => None,
        }
    }

    fn enum_name(&self) -> Option<String> {
        match self {
            Self::Enum { name, .. } => Some(name.clone()),
            _ => None,
        }
    }

    fn elements(&self) -> Option<Vec<Option<RecordRef>>> {
        match self {
            Self::Collection { items } => Some(
                items
                    .iter()
                    .map(|item| (!item.is_null()).then(|| item.clone() as RecordRef))
                    .collect(),
            ),
            _ => None,
        }
    }

    fn properties(&self) -> Vec<RecordProperty> {
        let Self::Object { properties, .. } = self else {
            return Vec::new();
        };

        properties
            .iter()
            .map(|p| match (&p.error, &p.value) {
                (Some(error), _) => RecordProperty::unreadable(p.name.clone(), error.clone()),
                (None, Some(value)) if !value.is_null() => {
                    RecordProperty::value(p.name.clone(), value.clone())
                }
                (None, _) => RecordProperty::empty(p.name.clone()),
            })
            .collect()
    }
}
