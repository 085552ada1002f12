//! Draft persistence and debounced autosave
//!
//! The draft is a single slot under its own key: each save overwrites the
//! previous one and there is no history. A corrupt draft is reported as
//! absent. Whether to restore or discard an existing draft on startup is
//! the caller's decision; this module only exposes existence and content.

use std::sync::{Arc, Mutex};
use tokio::time::Duration;
use tracing::{debug, error, warn};

use crate::error::{AppraiseError, Result};
use crate::schedule::Debouncer;
use crate::storage::{KeyValueBackend, DRAFT_KEY};
use crate::types::Assessment;

/// Single-slot store for the in-progress assessment
#[derive(Clone)]
pub struct DraftStore {
    backend: Arc<dyn KeyValueBackend>,
    key: String,
}

impl DraftStore {
    /// Store under the default draft key
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self::with_key(backend, DRAFT_KEY)
    }

    pub fn with_key(backend: Arc<dyn KeyValueBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Overwrite the stored draft
    pub fn save_draft(&self, draft: &Assessment) -> Result<()> {
        let json = serde_json::to_string(&draft.with_scores())?;
        self.backend.set(&self.key, &json)?;
        debug!("Draft saved to '{}'", self.key);
        Ok(())
    }

    /// The stored draft, or `None` when absent or unreadable
    pub fn load_draft(&self) -> Result<Option<Assessment>> {
        let Some(raw) = self.backend.get(&self.key)? else {
            return Ok(None);
        };

        match serde_json::from_str::<Assessment>(&raw) {
            Ok(draft) => Ok(Some(draft)),
            Err(e) => {
                warn!("Ignoring corrupt draft under '{}': {}", self.key, e);
                Ok(None)
            }
        }
    }

    /// Whether a readable draft is stored; a corrupt one counts as absent
    pub fn has_draft(&self) -> Result<bool> {
        Ok(self.load_draft()?.is_some())
    }

    pub fn clear_draft(&self) -> Result<()> {
        self.backend.remove(&self.key)?;
        debug!("Draft cleared from '{}'", self.key);
        Ok(())
    }
}

/// Debounced draft writer
///
/// Every form change hands the latest draft to [`record_change`]; the write
/// happens once edits pause for the debounce window. Only the most recent
/// draft is written.
///
/// [`record_change`]: Autosaver::record_change
pub struct Autosaver {
    store: DraftStore,
    debouncer: Debouncer,
    latest: Arc<Mutex<Option<Assessment>>>,
}

impl Autosaver {
    pub fn new(store: DraftStore, window: Duration) -> Self {
        Self {
            store,
            debouncer: Debouncer::new(window),
            latest: Arc::new(Mutex::new(None)),
        }
    }

    pub fn store(&self) -> &DraftStore {
        &self.store
    }

    /// Queue `draft` and restart the quiet-period timer
    pub fn record_change(&mut self, draft: Assessment) {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(draft);
        }

        let store = self.store.clone();
        let latest = Arc::clone(&self.latest);
        self.debouncer.schedule(move || {
            if let Err(e) = write_latest(&store, &latest) {
                error!("Autosave failed: {}", e);
            }
        });
    }

    /// Write the queued draft now, skipping the timer
    pub fn flush(&mut self) -> Result<()> {
        self.debouncer.cancel();
        write_latest(&self.store, &self.latest)
    }

    /// Forget the queued draft without writing it
    ///
    /// Blocks until a write already in progress on a timer task finishes,
    /// so nothing this autosaver queued reaches the store afterwards.
    pub fn cancel(&mut self) {
        self.debouncer.cancel();
        if let Ok(mut latest) = self.latest.lock() {
            *latest = None;
        }
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }
}

// The lock is held across the save so `cancel` waits out an in-flight write
fn write_latest(store: &DraftStore, latest: &Mutex<Option<Assessment>>) -> Result<()> {
    let mut latest = latest
        .lock()
        .map_err(|e| AppraiseError::Other(format!("autosave state poisoned: {}", e)))?;

    match latest.take() {
        Some(draft) => store.save_draft(&draft),
        None => Ok(()),
    }
}
