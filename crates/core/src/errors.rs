//! Error types for the presetsync core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Validation(#[from] SchemaViolation),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Version errors
// ---------------------------------------------------------------------------

/// Errors from parsing a dotted version string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VersionError {
    /// The version string was empty.
    #[error("version string is empty")]
    Empty,

    /// One of the dot-separated segments is not a non-negative integer.
    #[error("invalid segment '{segment}' in version '{version}'")]
    InvalidSegment { version: String, segment: String },
}

// ---------------------------------------------------------------------------
// Fetch errors
// ---------------------------------------------------------------------------

/// Errors from the remote preset source.
#[derive(Debug, Error)]
pub enum FetchError {
    /// HTTP-level transport error (network, TLS, etc.).
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The request did not complete within the configured timeout.
    #[error("request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    /// The remote returned a non-success status code.
    #[error("request to {url} failed (HTTP {status})")]
    Status { url: String, status: u16 },

    /// The response body is not valid JSON.
    #[error("invalid JSON from {url}: {detail}")]
    ParseError { url: String, detail: String },

    /// The JSON payload does not have the expected shape.
    #[error("unexpected payload from {url}: {detail}")]
    UnexpectedPayload { url: String, detail: String },

    /// A preset file decoded to something other than a JSON object.
    #[error("preset file '{path}' is not a JSON object")]
    NotAnObject { path: String },

    /// A request URL could not be built.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

// ---------------------------------------------------------------------------
// Schema errors
// ---------------------------------------------------------------------------

/// Errors from building a schema validator.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema document itself is not a valid JSON schema.
    #[error("failed to compile schema: {0}")]
    CompileFailed(String),

    /// The schema file could not be read or parsed.
    #[error("failed to read schema file '{path}': {detail}")]
    ReadFailed { path: String, detail: String },
}

/// A candidate document failed schema validation.
///
/// Displays as a single string starting with a line break, one error per
/// line, ready to be appended to a log message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}", line_break_prefixed(.errors))]
pub struct SchemaViolation {
    pub errors: Vec<String>,
}

impl SchemaViolation {
    pub fn new(errors: Vec<String>) -> Self {
        Self { errors }
    }

    /// The formatted error string.
    pub fn error_string(&self) -> String {
        self.to_string()
    }
}

fn line_break_prefixed(errors: &[String]) -> String {
    errors.iter().map(|error| format!("\n{}", error)).collect()
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

/// Errors from the local persisted preset file.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but does not contain valid JSON.
    #[error("failed to parse '{path}': {detail}")]
    ParseError { path: String, detail: String },

    /// The document could not be serialized.
    #[error("failed to serialize document: {0}")]
    SerializeError(String),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
