//! Preset synchronization orchestrator.
//!
//! [`PresetSync`] ties the pipeline together:
//!
//! 1. Fetch the manifest and resolve the revision for the running version.
//! 2. Fetch every preset file of that revision.
//! 3. Merge them into one document.
//! 4. Validate the document against the schema.
//! 5. Swap it into the [`PresetStore`] and persist it.
//!
//! A lock flag turns overlapping `download` calls into no-ops. Transitions
//! never return errors; failures become [`LogEvent`]s and an outcome value.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{AlertConfig, AppConfig};
use crate::errors::{CoreError, SchemaViolation};
use crate::events::{EventSink, LogEvent};
use crate::merge::merge;
use crate::remote::{Endpoints, HttpSource, PresetFetcher};
use crate::schema::{JsonSchemaValidator, SchemaValidator};
use crate::storage::{JsonFileStorage, PresetStorage};
use crate::store::{PresetStore, Snapshot};

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Orchestrator states.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Idle,
    Downloading,
    Loading,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Downloading => write!(f, "downloading"),
            Self::Loading => write!(f, "loading"),
        }
    }
}

/// Result of one `download` transition.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    /// Another download was already running.
    Skipped,
    /// The merged document passed validation and replaced the store.
    Applied { revision: String, files: usize },
    /// The merged document failed validation; the store is unchanged.
    Rejected {
        revision: String,
        violation: SchemaViolation,
    },
    /// A network or payload error aborted the run.
    Failed {
        revision: Option<String>,
        error: String,
    },
}

impl DownloadOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// What the persistence step of `load` found.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistedOutcome {
    /// A valid document was read and accepted.
    Loaded,
    /// No persisted document exists.
    Missing,
    /// The document could not be read or failed validation. Saving is
    /// disabled until a good document is accepted.
    Corrupted { error: String },
}

/// Result of the startup `load` sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub download: DownloadOutcome,
    pub persisted: PersistedOutcome,
}

/// Settings the orchestrator needs from the configuration.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub app_version: String,
    pub default_revision: String,
    pub alerts: AlertConfig,
}

impl SyncOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            app_version: config.app.version.clone(),
            default_revision: config.remote.default_revision.clone(),
            alerts: config.alerts.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct PresetSync {
    options: SyncOptions,
    fetcher: PresetFetcher,
    storage: Arc<dyn PresetStorage>,
    validator: Arc<dyn SchemaValidator>,
    events: Arc<dyn EventSink>,
    store: Arc<PresetStore>,
    /// Lock flag preventing overlapping downloads.
    downloading: AtomicBool,
    /// Number of `load` calls reading the persisted document.
    loading: AtomicUsize,
    /// Set when the persisted document was unreadable at startup.
    saving_disabled: AtomicBool,
    state: watch::Sender<SyncState>,
}

impl PresetSync {
    pub fn new(
        options: SyncOptions,
        fetcher: PresetFetcher,
        storage: Arc<dyn PresetStorage>,
        validator: Arc<dyn SchemaValidator>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        info!(
            app_version = %options.app_version,
            storage = %storage.location(),
            "initializing preset sync"
        );
        let (state, _rx) = watch::channel(SyncState::Idle);
        Self {
            options,
            fetcher,
            storage,
            validator,
            events,
            store: Arc::new(PresetStore::new()),
            downloading: AtomicBool::new(false),
            loading: AtomicUsize::new(0),
            saving_disabled: AtomicBool::new(false),
            state,
        }
    }

    /// Wire up the HTTP source, file storage and schema from configuration.
    pub fn from_config(
        config: &AppConfig,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, CoreError> {
        let source = HttpSource::from_config(&config.remote)?;
        let endpoints = Endpoints::from_config(&config.remote)?;
        let validator = match &config.storage.schema_file {
            Some(path) => JsonSchemaValidator::from_file(path)?,
            None => JsonSchemaValidator::presets()?,
        };
        Ok(Self::new(
            SyncOptions::from_config(config),
            PresetFetcher::new(Arc::new(source), endpoints),
            Arc::new(JsonFileStorage::new(config.presets_file())),
            Arc::new(validator),
            events,
        ))
    }

    pub fn store(&self) -> &Arc<PresetStore> {
        &self.store
    }

    /// Current accepted document.
    pub fn data(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn fetcher(&self) -> &PresetFetcher {
        &self.fetcher
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub fn is_downloading(&self) -> bool {
        self.downloading.load(Ordering::SeqCst)
    }

    pub fn saving_disabled(&self) -> bool {
        self.saving_disabled.load(Ordering::SeqCst)
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Fetch, merge, validate and store the remote presets.
    ///
    /// A call made while another download is running returns
    /// [`DownloadOutcome::Skipped`] immediately. `force` raises an alert on
    /// success and saves even when saving is disabled.
    pub async fn download(&self, force: bool) -> DownloadOutcome {
        if self
            .downloading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("download already in progress, skipping");
            return DownloadOutcome::Skipped;
        }

        // Clears the flag and settles the state even if the future is dropped.
        let _guard = TransitionGuard::downloading(self);

        self.run_download(force).await
    }

    async fn run_download(&self, force: bool) -> DownloadOutcome {
        info!(app_version = %self.options.app_version, "downloading config presets");

        let revision = match self
            .fetcher
            .resolve(&self.options.app_version, &self.options.default_revision)
            .await
        {
            Ok(revision) => revision,
            Err(e) => {
                self.events
                    .emit(LogEvent::error(format!("Failed to download config presets: {}", e)));
                return DownloadOutcome::Failed {
                    revision: None,
                    error: e.to_string(),
                };
            }
        };

        if revision != self.options.default_revision {
            self.events.emit(LogEvent::info(format!(
                "Application is not up to date, cached config presets downloaded from commit: {}",
                revision
            )));
        }

        let entries = match self.fetcher.fetch_presets(&revision).await {
            Ok(entries) => entries,
            Err(e) => {
                self.events.emit(LogEvent::error(format!(
                    "Failed to download config presets (commit: {}): {}",
                    revision, e
                )));
                return DownloadOutcome::Failed {
                    revision: Some(revision),
                    error: e.to_string(),
                };
            }
        };
        let files = entries.len();

        match self.set(merge(entries)) {
            Ok(()) => {
                let mut event = LogEvent::info("Config presets downloaded");
                if force {
                    let duration = Duration::from_millis(self.options.alerts.downloaded_ms);
                    event = event.with_alert(duration);
                }
                self.events.emit(event);
                self.save(force).await;
                DownloadOutcome::Applied { revision, files }
            }
            Err(violation) => {
                self.events.emit(LogEvent::error(format!(
                    "Failed to download config presets (commit: {}): {}",
                    revision, violation
                )));
                DownloadOutcome::Rejected {
                    revision,
                    violation,
                }
            }
        }
    }

    /// Startup sequence: refresh from the remote, then load the persisted
    /// document, which takes precedence when it is valid.
    pub async fn load(&self) -> LoadReport {
        let download = self.download(false).await;

        let _guard = TransitionGuard::loading(self);
        let persisted = match self.storage.read().await {
            Ok(None) => {
                debug!(path = %self.storage.location(), "no persisted config presets");
                PersistedOutcome::Missing
            }
            Ok(Some(document)) => match self.set(document) {
                Ok(()) => {
                    info!(path = %self.storage.location(), "loaded persisted config presets");
                    PersistedOutcome::Loaded
                }
                Err(violation) => self.disable_saving(violation.error_string()),
            },
            Err(e) => self.disable_saving(e.to_string()),
        };

        LoadReport {
            download,
            persisted,
        }
    }

    /// Validate `data` and, if it passes, replace the stored document.
    ///
    /// Accepting a document re-enables saving.
    pub fn set(&self, data: Value) -> Result<(), SchemaViolation> {
        self.validator.validate(&data)?;
        self.store.replace(data);
        if self.saving_disabled.swap(false, Ordering::SeqCst) {
            info!("valid config presets accepted, saving re-enabled");
        }
        Ok(())
    }

    /// Write the current document to storage.
    ///
    /// Does nothing while saving is disabled unless `force` is set. Returns
    /// whether the document was written.
    pub async fn save(&self, force: bool) -> bool {
        if self.saving_disabled() && !force {
            warn!("saving config presets is disabled, skipping write");
            return false;
        }

        let document = self.store.snapshot();
        match self.storage.write(&document).await {
            Ok(()) => true,
            Err(e) => {
                self.events.emit(
                    LogEvent::error("Failed to save config presets").with_alert(
                        Duration::from_millis(self.options.alerts.write_error_ms),
                    ),
                );
                self.events.emit(LogEvent::error(format!(
                    "Failed to write config presets to \"{}\": {}",
                    self.storage.location(),
                    e
                )));
                false
            }
        }
    }

    fn disable_saving(&self, error: String) -> PersistedOutcome {
        self.saving_disabled.store(true, Ordering::SeqCst);
        self.events.emit(
            LogEvent::error("Failed to load config presets")
                .with_alert(Duration::from_millis(self.options.alerts.load_error_ms))
                .alert_only(),
        );
        self.events.emit(LogEvent::error(format!(
            "Config presets file \"{}\" is corrupted or unreadable: {}",
            self.storage.location(),
            error
        )));
        PersistedOutcome::Corrupted { error }
    }
}

/// Marks one transition as running and settles the published state on drop.
///
/// The settled state is derived from what is still running, never from a
/// saved value, so overlapping transitions always end at `Idle`.
struct TransitionGuard<'a> {
    state: &'a watch::Sender<SyncState>,
    downloading: &'a AtomicBool,
    loading: &'a AtomicUsize,
    kind: SyncState,
}

impl<'a> TransitionGuard<'a> {
    /// Enter `Downloading`. The caller must already hold the download flag.
    fn downloading(sync: &'a PresetSync) -> Self {
        sync.state.send_replace(SyncState::Downloading);
        Self::new(sync, SyncState::Downloading)
    }

    fn loading(sync: &'a PresetSync) -> Self {
        sync.loading.fetch_add(1, Ordering::SeqCst);
        sync.state.send_replace(SyncState::Loading);
        Self::new(sync, SyncState::Loading)
    }

    fn new(sync: &'a PresetSync, kind: SyncState) -> Self {
        Self {
            state: &sync.state,
            downloading: &sync.downloading,
            loading: &sync.loading,
            kind,
        }
    }
}

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        match self.kind {
            SyncState::Downloading => self.downloading.store(false, Ordering::SeqCst),
            SyncState::Loading => {
                self.loading.fetch_sub(1, Ordering::SeqCst);
            }
            SyncState::Idle => {}
        }
        let settled = if self.downloading.load(Ordering::SeqCst) {
            SyncState::Downloading
        } else if self.loading.load(Ordering::SeqCst) > 0 {
            SyncState::Loading
        } else {
            SyncState::Idle
        };
        self.state.send_replace(settled);
    }
}
