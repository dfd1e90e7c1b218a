//! TOML-based configuration for presetsync.
//!
//! Secrets (the optional GitHub token) are never stored in the file; the
//! file names an environment variable and the value is resolved at runtime
//! via [`AppConfig::resolve_env_vars`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::revision::DEFAULT_REVISION;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Running application settings.
    #[serde(default)]
    pub app: AppSection,

    /// Remote preset repository settings.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Local persistence settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Alert display durations.
    #[serde(default)]
    pub alerts: AlertConfig,
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSection {
    /// Version of the running application, matched against the manifest.
    #[serde(default = "default_app_version")]
    pub version: String,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory for persistent data.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_app_version() -> String {
    env!("CARGO_PKG_VERSION").into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("presetsync"))
        .unwrap_or_else(|| PathBuf::from(".presetsync"))
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            version: default_app_version(),
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Remote
// ---------------------------------------------------------------------------

/// Where presets are published and how they are requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Repository in `owner/repo` format.
    #[serde(default = "default_repo")]
    pub repo: String,

    /// Base URL serving raw file contents.
    #[serde(default = "default_raw_url")]
    pub raw_url: String,

    /// GitHub API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Ref the manifest is always read from.
    #[serde(default = "default_manifest_ref")]
    pub manifest_ref: String,

    /// Path of the version -> commit manifest inside the repository.
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,

    /// Directory whose direct children are preset files.
    #[serde(default = "default_presets_dir")]
    pub presets_dir: String,

    /// Revision used when no manifest entry applies.
    #[serde(default = "default_revision")]
    pub default_revision: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Environment variable holding an optional API token.
    #[serde(default)]
    pub token_env: Option<String>,

    /// Resolved token (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_repo() -> String {
    "SteamGridDB/steam-rom-manager".into()
}
fn default_raw_url() -> String {
    "https://raw.githubusercontent.com".into()
}
fn default_api_url() -> String {
    "https://api.github.com".into()
}
fn default_manifest_ref() -> String {
    "master".into()
}
fn default_manifest_path() -> String {
    "files/presetsHashes.json".into()
}
fn default_presets_dir() -> String {
    "files/presets".into()
}
fn default_revision() -> String {
    DEFAULT_REVISION.into()
}
fn default_timeout_ms() -> u64 {
    5000
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            repo: default_repo(),
            raw_url: default_raw_url(),
            api_url: default_api_url(),
            manifest_ref: default_manifest_ref(),
            manifest_path: default_manifest_path(),
            presets_dir: default_presets_dir(),
            default_revision: default_revision(),
            timeout_ms: default_timeout_ms(),
            token_env: None,
            token: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Persisted presets file. Defaults to `<data_dir>/configPresets.json`.
    #[serde(default)]
    pub presets_file: Option<PathBuf>,

    /// JSON schema file replacing the built-in preset schema.
    #[serde(default)]
    pub schema_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// How long user-facing alerts stay visible, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_downloaded_ms")]
    pub downloaded_ms: u64,

    #[serde(default = "default_load_error_ms")]
    pub load_error_ms: u64,

    #[serde(default = "default_write_error_ms")]
    pub write_error_ms: u64,
}

fn default_downloaded_ms() -> u64 {
    5000
}
fn default_load_error_ms() -> u64 {
    5000
}
fn default_write_error_ms() -> u64 {
    3000
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            downloaded_ms: default_downloaded_ms(),
            load_error_ms: default_load_error_ms(),
            write_error_ms: default_write_error_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve `*_env` fields from environment variables.
    ///
    /// A missing variable logs a warning but does not fail; the token is
    /// optional and only raises the API rate limit.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref env_name) = self.remote.token_env {
            self.remote.token = resolve_optional_env(env_name, "remote.token_env");
        }
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.repo.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "remote.repo".into(),
                detail: "repository must not be empty".into(),
            });
        }
        if self.remote.repo.split('/').filter(|p| !p.is_empty()).count() != 2 {
            return Err(ConfigError::InvalidValue {
                field: "remote.repo".into(),
                detail: "repository must be in 'owner/repo' format".into(),
            });
        }
        for (field, value) in [
            ("remote.raw_url", &self.remote.raw_url),
            ("remote.api_url", &self.remote.api_url),
        ] {
            if let Err(e) = reqwest::Url::parse(value) {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    detail: format!("'{}' is not a valid URL: {}", value, e),
                });
            }
        }
        if self.remote.presets_dir.trim_matches('/').is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "remote.presets_dir".into(),
                detail: "presets directory must not be empty".into(),
            });
        }
        if self.remote.default_revision.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "remote.default_revision".into(),
                detail: "default revision must not be empty".into(),
            });
        }
        if self.remote.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "remote.timeout_ms".into(),
                detail: "timeout must be > 0".into(),
            });
        }
        if self.app.version.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "app.version".into(),
                detail: "application version must not be empty".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`load_and_resolve`](Self::load_and_resolve), but a missing file
    /// yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::load_from_file(path)?
        } else {
            debug!(path = %path.display(), "no configuration file, using defaults");
            Self::default()
        };
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Path of the persisted presets file.
    pub fn presets_file(&self) -> PathBuf {
        self.storage
            .presets_file
            .clone()
            .unwrap_or_else(|| self.app.data_dir.join("configPresets.json"))
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}
