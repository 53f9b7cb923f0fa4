//! Result normalization
//!
//! Flattens remote object graphs into [`FlattenedValue`] trees that can be
//! serialized as JSON. Remote graphs may be arbitrarily deep and may refer
//! back to themselves, so recursion is bounded by [`MAX_DEPTH`].
//!
//! # Rules
//! Applied in order, first match wins:
//! 1. deeper than [`MAX_DEPTH`] → the record's rendering as a string
//! 2. native scalar → that scalar
//! 3. enumerated value → its name
//! 4. collection → list of flattened elements, null elements skipped
//! 5. rendering is non-empty and has no `{` or `;` → the rendering as a string
//! 6. otherwise → map of readable properties, unreadable ones omitted
//!
//! Rule 5 lets types such as durations and distinguished names, which the
//! remote side renders meaningfully, stay simple strings. A free-text value
//! whose rendering happens to contain `;` or `{` is expanded to a map.

pub mod value;

use crate::remote::{RawRecord, RecordRef};
use std::collections::BTreeMap;
use tracing::debug;

pub use value::{FlattenedValue, Scalar};

/// Depth beyond which records are rendered instead of expanded
pub const MAX_DEPTH: usize = 5;

/// Flatten one record
///
/// `depth` is the nesting level of `record`; callers start at 0.
pub fn flatten(record: &dyn RawRecord, depth: usize) -> FlattenedValue {
    if depth > MAX_DEPTH {
        return FlattenedValue::string(record.render());
    }

    if let Some(scalar) = record.as_scalar() {
        return FlattenedValue::Scalar(scalar);
    }

    if let Some(name) = record.enum_name() {
        return FlattenedValue::string(name);
    }

    if let Some(elements) = record.elements() {
        return FlattenedValue::List(
            elements
                .iter()
                .flatten()
                .map(|element| flatten(element.as_ref(), depth + 1))
                .collect(),
        );
    }

    let rendered = record.render();
    if is_simple_rendering(&rendered) {
        return FlattenedValue::string(rendered);
    }

    let mut map = BTreeMap::new();
    for property in record.properties() {
        match property.value {
            Ok(Some(value)) => {
                map.insert(property.name, flatten(value.as_ref(), depth + 1));
            }
            Ok(None) => {
                map.insert(property.name, FlattenedValue::Null);
            }
            Err(e) => debug!("Skipping unreadable property {}: {}", property.name, e),
        }
    }
    FlattenedValue::Map(map)
}

/// Flatten a batch of top-level records
pub fn flatten_all(records: &[RecordRef]) -> Vec<FlattenedValue> {
    records
        .iter()
        .map(|record| flatten(record.as_ref(), 0))
        .collect()
}

fn is_simple_rendering(rendered: &str) -> bool {
    !rendered.is_empty() && !rendered.contains('{') && !rendered.contains(';')
}
