//! Capability interface over remote result objects
//!
//! The remote object model has no reliable type tags, so the normalizer only
//! ever asks a record what it can do: unwrap to a scalar, name an enumerated
//! value, list its elements, or enumerate its properties. Each protocol
//! adapter implements [`RawRecord`] for its own object representation.

use crate::normalize::Scalar;
use std::sync::Arc;

/// Shared handle to a remote record; graphs may contain back-references
pub type RecordRef = Arc<dyn RawRecord>;

/// One enumerated property of a composite record
pub struct RecordProperty {
    pub name: String,
    /// `Ok(None)` for an empty property, `Err` when the getter failed
    pub value: Result<Option<RecordRef>, String>,
}

impl RecordProperty {
    pub fn value(name: impl Into<String>, value: RecordRef) -> Self {
        Self {
            name: name.into(),
            value: Ok(Some(value)),
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Ok(None),
        }
    }

    pub fn unreadable(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Err(reason.into()),
        }
    }
}

/// A remote result object
pub trait RawRecord: Send + Sync {
    /// Textual rendering, as the remote shell would print the object
    fn render(&self) -> String;

    /// Unwrap to a native scalar (string, bool, number, timestamp, identifier)
    fn as_scalar(&self) -> Option<Scalar> {
        None
    }

    /// Name of an enumerated value
    fn enum_name(&self) -> Option<String> {
        None
    }

    /// Elements when the record is a collection; `None` entries are nulls
    fn elements(&self) -> Option<Vec<Option<RecordRef>>> {
        None
    }

    /// Enumerate properties of a composite record
    fn properties(&self) -> Vec<RecordProperty> {
        Vec::new()
    }
}
