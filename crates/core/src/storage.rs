//! Local persistence for the accepted preset document.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::errors::StorageError;

/// Opaque JSON blob store holding one preset document.
#[async_trait]
pub trait PresetStorage: Send + Sync {
    /// Human-readable location used in log messages.
    fn location(&self) -> String;

    /// Read the stored document. A missing file is `Ok(None)`.
    async fn read(&self) -> Result<Option<Value>, StorageError>;

    /// Replace the stored document.
    async fn write(&self, document: &Value) -> Result<(), StorageError>;
}

/// Stores the document as pretty-printed JSON in a single file.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write never leaves a truncated document behind.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl PresetStorage for JsonFileStorage {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    async fn read(&self) -> Result<Option<Value>, StorageError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no persisted presets file");
                return Ok(None);
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let document = serde_json::from_str(&contents).map_err(|e| StorageError::ParseError {
            path: self.path.display().to_string(),
            detail: e.to_string(),
        })?;
        debug!(path = %self.path.display(), "read persisted presets");
        Ok(Some(document))
    }

    async fn write(&self, document: &Value) -> Result<(), StorageError> {
        let contents = serde_json::to_string_pretty(document)
            .map_err(|e| StorageError::SerializeError(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        info!(path = %self.path.display(), "saved presets");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("configPresets.json"));
        assert!(storage.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("nested/dir/configPresets.json"));
        let doc = json!({"Preset": {"parserType": "Glob", "configTitle": "T"}});

        storage.write(&doc).await.unwrap();
        assert_eq!(storage.read().await.unwrap(), Some(doc));
        assert!(!dir.path().join("nested/dir/configPresets.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configPresets.json");
        std::fs::write(&path, "{ not json").unwrap();

        let storage = JsonFileStorage::new(&path);
        let err = storage.read().await.unwrap_err();
        assert!(matches!(err, StorageError::ParseError { .. }));
        assert!(err.to_string().contains("configPresets.json"));
    }

    #[tokio::test]
    async fn test_write_into_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        // Parent "directory" is a regular file.
        let storage = JsonFileStorage::new(blocker.join("configPresets.json"));
        let err = storage.write(&json!({})).await.unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }
}
