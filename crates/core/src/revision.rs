//! Preset manifest and revision resolution.
//!
//! The remote publishes a manifest mapping application versions to the
//! commit that holds the presets compatible with that version:
//!
//! ```json
//! { "2.4.17": { "commit": "7f3c..." }, "2.5.0": { "commit": "a91b..." } }
//! ```
//!
//! Entries are kept in document order, which is the chronological order of
//! the version tags. Resolution is a first-match scan over that order.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::errors::VersionError;
use crate::version::numeric_key;

/// Revision used when no manifest entry applies.
pub const DEFAULT_REVISION: &str = "master";

/// One manifest record. Unknown fields are retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub commit: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RevisionRecord {
    pub fn new(commit: impl Into<String>) -> Self {
        Self {
            commit: commit.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Ordered mapping from version string to [`RevisionRecord`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevisionMap {
    entries: Vec<(String, RevisionRecord)>,
}

impl RevisionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, version: impl Into<String>, record: RevisionRecord) {
        self.entries.push((version.into(), record));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RevisionRecord)> {
        self.entries.iter().map(|(v, r)| (v.as_str(), r))
    }
}

impl<V: Into<String>> FromIterator<(V, RevisionRecord)> for RevisionMap {
    fn from_iter<I: IntoIterator<Item = (V, RevisionRecord)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(v, r)| (v.into(), r)).collect(),
        }
    }
}

impl<'de> Deserialize<'de> for RevisionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = RevisionMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping versions to {\"commit\": ...} records")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries: Vec<(String, RevisionRecord)> =
                    Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((version, record)) =
                    access.next_entry::<String, RevisionRecord>()?
                {
                    // Later duplicates replace earlier ones but keep the first position.
                    match entries.iter_mut().find(|entry| entry.0 == version) {
                        Some(slot) => slot.1 = record,
                        None => entries.push((version, record)),
                    }
                }
                Ok(RevisionMap { entries })
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

impl Serialize for RevisionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(v, r)| (v, r)))
    }
}

/// Pick the commit for `app_version`, or `default_revision` if none applies.
///
/// Returns the commit of the first entry (in manifest order) whose version
/// is greater than or equal to the running version. Any version that fails
/// to parse along the way falls back to the default.
pub fn resolve_revision(
    app_version: &str,
    revisions: &RevisionMap,
    default_revision: &str,
) -> String {
    match find_revision(app_version, revisions) {
        Ok(Some((version, commit))) => {
            debug!(
                app_version,
                manifest_version = version,
                commit,
                "running version is behind the latest presets, using cached presets"
            );
            commit.to_string()
        }
        Ok(None) => {
            debug!(app_version, default_revision, "no cached preset revision applies");
            default_revision.to_string()
        }
        Err(e) => {
            debug!(app_version, error = %e, "version parse failed, using default revision");
            default_revision.to_string()
        }
    }
}

fn find_revision<'a>(
    app_version: &str,
    revisions: &'a RevisionMap,
) -> Result<Option<(&'a str, &'a str)>, VersionError> {
    let app_key = numeric_key(app_version)?;
    for (version, record) in revisions.iter() {
        if app_key <= numeric_key(version)? {
            return Ok(Some((version, record.commit.as_str())));
        }
    }
    Ok(None)
}
