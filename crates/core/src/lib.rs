//! Presetsync core library.
//!
//! Fetches a versioned bundle of shared configuration presets from a remote
//! repository, picks the historical revision that matches the running
//! application version, merges the preset files, validates the result
//! against a schema and only then stores and persists it.

pub mod config;
pub mod errors;
pub mod events;
pub mod merge;
pub mod remote;
pub mod revision;
pub mod schema;
pub mod storage;
pub mod store;
pub mod sync_engine;
pub mod version;

// Re-exports for convenience.
pub use config::AppConfig;
pub use events::{EventSink, LogEvent};
pub use remote::{PresetFetcher, RemoteSource};
pub use schema::{JsonSchemaValidator, SchemaValidator};
pub use storage::{JsonFileStorage, PresetStorage};
pub use store::PresetStore;
pub use sync_engine::PresetSync;
