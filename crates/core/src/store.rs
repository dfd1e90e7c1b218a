//! Process-wide holder of the latest accepted preset document.
//!
//! A single cell whose value is swapped whole. Readers take a snapshot;
//! observers subscribe and are notified on every swap. Dropping the
//! returned [`Subscription`] unsubscribes.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;

/// Shared, read-only view of an accepted document.
pub type Snapshot = Arc<Value>;

/// The preset document cell.
#[derive(Debug)]
pub struct PresetStore {
    tx: watch::Sender<Snapshot>,
}

impl PresetStore {
    /// A store holding an empty object.
    pub fn new() -> Self {
        Self::with_document(Value::Object(serde_json::Map::new()))
    }

    pub fn with_document(document: Value) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(document));
        Self { tx }
    }

    /// Current document.
    pub fn snapshot(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    /// Register for change notifications.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Swap in a new document and notify observers.
    pub(crate) fn replace(&self, document: Value) {
        let keys = document.as_object().map(|m| m.len()).unwrap_or(0);
        self.tx.send_replace(Arc::new(document));
        debug!(keys, observers = self.tx.receiver_count(), "preset store replaced");
    }
}

impl Default for PresetStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Change notifications from a [`PresetStore`].
#[derive(Debug)]
pub struct Subscription {
    rx: watch::Receiver<Snapshot>,
}

impl Subscription {
    /// Wait for the next replacement and return the new document.
    ///
    /// Returns `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// The latest document, without waiting.
    pub fn latest(&self) -> Snapshot {
        self.rx.borrow().clone()
    }

    /// Whether a replacement happened since the last [`changed`](Self::changed).
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }
}
