//! Shallow merge of fetched preset files into one document.

use serde_json::{Map, Value};
use tracing::debug;

/// A partial preset document fetched from one remote file.
#[derive(Debug, Clone, PartialEq)]
pub struct PresetEntry {
    /// Repository path the document was fetched from.
    pub path: String,
    pub document: Map<String, Value>,
}

impl PresetEntry {
    pub fn new(path: impl Into<String>, document: Map<String, Value>) -> Self {
        Self {
            path: path.into(),
            document,
        }
    }
}

/// Merge `entries` in order. On a top-level key collision the later entry
/// wins and its value replaces the earlier one wholesale. Collisions are not
/// reported.
pub fn merge<I>(entries: I) -> Value
where
    I: IntoIterator<Item = PresetEntry>,
{
    let mut combined = Map::new();
    for entry in entries {
        debug!(path = %entry.path, keys = entry.document.len(), "merging preset file");
        combined.extend(entry.document);
    }
    Value::Object(combined)
}
