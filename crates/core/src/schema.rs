//! Schema gate applied to every candidate preset document.
//!
//! [`SchemaValidator`] is the pluggable seam; [`JsonSchemaValidator`] is the
//! JSON-schema backed implementation used by default. The gate adds only
//! formatting: all errors collapse into one [`SchemaViolation`].

use std::path::Path;

use jsonschema::JSONSchema;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::errors::{SchemaError, SchemaViolation};

/// Validates a candidate document before it is stored or persisted.
pub trait SchemaValidator: Send + Sync {
    fn validate(&self, document: &Value) -> Result<(), SchemaViolation>;
}

/// Validator backed by a compiled JSON schema.
pub struct JsonSchemaValidator {
    compiled: JSONSchema,
}

impl JsonSchemaValidator {
    pub fn new(schema: &Value) -> Result<Self, SchemaError> {
        let compiled =
            JSONSchema::compile(schema).map_err(|e| SchemaError::CompileFailed(e.to_string()))?;
        Ok(Self { compiled })
    }

    /// Validator for the built-in preset schema.
    pub fn presets() -> Result<Self, SchemaError> {
        Self::new(&preset_schema())
    }

    /// Load a schema document from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading preset schema");

        let contents = std::fs::read_to_string(path).map_err(|e| SchemaError::ReadFailed {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        let schema: Value = serde_json::from_str(&contents).map_err(|e| SchemaError::ReadFailed {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        Self::new(&schema)
    }
}

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, document: &Value) -> Result<(), SchemaViolation> {
        let result = self.compiled.validate(document);
        let errors: Vec<String> = match result {
            Ok(()) => return Ok(()),
            Err(errors) => errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    let path = if path.is_empty() { "/".to_string() } else { path };
                    format!("{}: {}", path, e)
                })
                .collect(),
        };
        debug!(count = errors.len(), "document failed schema validation");
        Err(SchemaViolation::new(errors))
    }
}

/// Built-in schema for a combined preset document.
///
/// The document maps preset names to partial user configurations. Every
/// preset needs a parser type and a title; other fields are optional and
/// only type-checked.
pub fn preset_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": {
            "type": "object",
            "required": ["parserType", "configTitle"],
            "properties": {
                "parserType": { "type": "string", "minLength": 1 },
                "configTitle": { "type": "string" },
                "parserId": { "type": "string" },
                "steamCategories": { "type": "array", "items": { "type": "string" } },
                "executable": {
                    "type": "object",
                    "properties": {
                        "path": { "type": "string" },
                        "shortcutPassthrough": { "type": "boolean" },
                        "appendArgsToExecutable": { "type": "boolean" }
                    }
                },
                "executableArgs": { "type": "string" },
                "executableModifier": { "type": "string" },
                "romDirectory": { "type": "string" },
                "steamDirectory": { "type": "string" },
                "startInDirectory": { "type": "string" },
                "titleModifier": { "type": "string" },
                "imagePool": { "type": "string" },
                "drmProtect": { "type": "boolean" },
                "onlineImageQueries": { "type": "string" },
                "imageProviders": { "type": "array", "items": { "type": "string" } },
                "parserInputs": { "type": "object" },
                "userAccounts": {
                    "type": "object",
                    "properties": {
                        "specifiedAccounts": { "type": "array", "items": { "type": "string" } }
                    }
                },
                "fuzzyMatch": { "type": "object" },
                "titleFromVariable": { "type": "object" },
                "controllers": { "type": "object" },
                "disabled": { "type": "boolean" }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> JsonSchemaValidator {
        JsonSchemaValidator::presets().expect("built-in schema compiles")
    }

    #[test]
    fn test_accepts_valid_presets() {
        let doc = json!({
            "Dolphin (Windows)": {
                "parserType": "Glob",
                "configTitle": "Nintendo GameCube - Dolphin",
                "executableArgs": "-b -e \"${filePath}\"",
                "steamCategories": ["${title}"]
            }
        });
        assert!(validator().validate(&doc).is_ok());
    }

    #[test]
    fn test_empty_document_is_valid() {
        assert!(validator().validate(&json!({})).is_ok());
    }

    #[test]
    fn test_rejects_missing_required_field() {
        let doc = json!({ "Broken": { "configTitle": "no parser" } });
        let err = validator().validate(&doc).unwrap_err();
        let s = err.error_string();
        assert!(s.starts_with('\n'));
        assert!(s.contains("parserType"), "got: {s}");
        assert!(s.contains("/Broken"), "got: {s}");
    }

    #[test]
    fn test_rejects_non_object_document() {
        let err = validator().validate(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert!(err.errors[0].starts_with("/: "));
    }

    #[test]
    fn test_collects_all_errors() {
        let doc = json!({
            "A": { "configTitle": 1 },
            "B": "not an object"
        });
        let err = validator().validate(&doc).unwrap_err();
        assert!(err.errors.len() >= 3, "got: {:?}", err.errors);
    }

    #[test]
    fn test_custom_schema_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, r#"{"type":"object","required":["only"]}"#).unwrap();

        let custom = JsonSchemaValidator::from_file(&path).unwrap();
        assert!(custom.validate(&json!({"only": true})).is_ok());
        assert!(custom.validate(&json!({})).is_err());
    }

    #[test]
    fn test_invalid_schema_fails_to_compile() {
        let result = JsonSchemaValidator::new(&json!({"type": 12}));
        assert!(matches!(result, Err(SchemaError::CompileFailed(_))));
    }

    #[test]
    fn test_missing_schema_file() {
        let result = JsonSchemaValidator::from_file("/nonexistent/schema.json");
        assert!(matches!(result, Err(SchemaError::ReadFailed { .. })));
    }
}
