//! Visitor session state
//!
//! Visitor identity, session identity, visit counter and the set of
//! dismissed tracking keys, persisted through a [`KeyValueStore`].
//!
//! All keys live under the `popwise:` namespace. Store faults never
//! propagate out of [`SessionState`]: reads fall back to empty state and
//! writes are logged.

pub mod file;
pub mod memory;

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::StoreError;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Key prefix for everything the engine persists.
pub const NAMESPACE: &str = "popwise:";

const VISITOR_ID: &str = "visitor_id";
const SESSION_ID: &str = "session_id";
const VISIT_COUNT: &str = "visit_count";
const DISMISSED: &str = "dismissed";

/// Returns the namespaced form of `key`.
#[must_use]
pub fn namespaced(key: &str) -> String {
    format!("{NAMESPACE}{key}")
}

/// String key-value persistence.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value for `key`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Per-page-view handle to the visitor's persisted state.
pub struct SessionState {
    store: Arc<dyn KeyValueStore>,
    visitor_id: String,
    session_id: String,
    visit_count: u64,
    dismissed: Mutex<BTreeSet<String>>,
}

impl SessionState {
    /// Opens the visitor state for a new page view.
    ///
    /// Creates visitor and session ids on first use and increments the
    /// visit counter.
    #[must_use]
    pub fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let visitor_id = read_or_create_id(store.as_ref(), VISITOR_ID);
        let session_id = read_or_create_id(store.as_ref(), SESSION_ID);

        let visit_count = read(store.as_ref(), VISIT_COUNT)
            .and_then(|raw| raw.parse::<u64>().ok())
            .unwrap_or(0)
            .saturating_add(1);
        write(store.as_ref(), VISIT_COUNT, &visit_count.to_string());

        let dismissed = read(store.as_ref(), DISMISSED)
            .map(|raw| parse_dismissed(&raw))
            .unwrap_or_default();

        info!(
            visitor_id = %visitor_id,
            session_id = %session_id,
            visit_count,
            dismissed = dismissed.len(),
            "session opened"
        );

        Self {
            store,
            visitor_id,
            session_id,
            visit_count,
            dismissed: Mutex::new(dismissed),
        }
    }

    /// Returns the visitor-scoped id.
    #[must_use]
    pub fn visitor_id(&self) -> &str {
        &self.visitor_id
    }

    /// Returns the session-scoped id.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Returns the visit counter including this page view.
    #[must_use]
    pub const fn visit_count(&self) -> u64 {
        self.visit_count
    }

    /// Returns `true` if `tracking_key` was dismissed.
    #[must_use]
    pub fn is_dismissed(&self, tracking_key: &str) -> bool {
        self.lock().contains(tracking_key)
    }

    /// Returns a copy of the dismissed set.
    #[must_use]
    pub fn dismissed(&self) -> BTreeSet<String> {
        self.lock().clone()
    }

    /// Adds `tracking_key` to the dismissed set. Idempotent.
    ///
    /// Returns `true` if the key was newly added.
    pub fn dismiss(&self, tracking_key: &str) -> bool {
        let mut dismissed = self.lock();
        if !dismissed.insert(tracking_key.to_string()) {
            debug!(key = tracking_key, "already dismissed");
            return false;
        }
        persist_dismissed(self.store.as_ref(), &dismissed);
        true
    }

    /// Empties the dismissed set.
    pub fn clear_dismissed(&self) {
        let mut dismissed = self.lock();
        dismissed.clear();
        if let Err(e) = self.store.remove(&namespaced(DISMISSED)) {
            warn!(error = %e, "failed to clear dismissed campaigns");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.dismissed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("visitor_id", &self.visitor_id)
            .field("session_id", &self.session_id)
            .field("visit_count", &self.visit_count)
            .field("dismissed", &self.lock().len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Inspection
// ============================================================================

/// Read-only view of persisted visitor state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    /// Visitor id, if one was created
    pub visitor_id: Option<String>,
    /// Session id, if one was created
    pub session_id: Option<String>,
    /// Recorded page views
    pub visit_count: u64,
    /// Dismissed tracking keys
    pub dismissed: BTreeSet<String>,
}

impl SessionSummary {
    /// Reads the persisted state without recording a visit.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read or holds a corrupt
    /// value.
    pub fn read(store: &dyn KeyValueStore) -> Result<Self, StoreError> {
        let visit_count = match store.get(&namespaced(VISIT_COUNT))? {
            Some(raw) => raw.parse().map_err(|_| StoreError::Corrupt {
                key: namespaced(VISIT_COUNT),
                reason: format!("not a counter: {raw}"),
            })?,
            None => 0,
        };
        let dismissed = match store.get(&namespaced(DISMISSED))? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => BTreeSet::new(),
        };
        Ok(Self {
            visitor_id: store.get(&namespaced(VISITOR_ID))?,
            session_id: store.get(&namespaced(SESSION_ID))?,
            visit_count,
            dismissed,
        })
    }
}

/// Removes the dismissed set from `store`, re-enabling every campaign.
///
/// # Errors
///
/// Returns `StoreError` if the store cannot be written.
pub fn clear_dismissed(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    store.remove(&namespaced(DISMISSED))?;
    info!("dismissed campaigns cleared");
    Ok(())
}

// ============================================================================
// Store Helpers
// ============================================================================

fn read(store: &dyn KeyValueStore, key: &str) -> Option<String> {
    match store.get(&namespaced(key)) {
        Ok(value) => value,
        Err(e) => {
            warn!(key, error = %e, "store read failed; using empty state");
            None
        }
    }
}

fn write(store: &dyn KeyValueStore, key: &str, value: &str) {
    if let Err(e) = store.set(&namespaced(key), value) {
        warn!(key, error = %e, "store write failed");
    }
}

fn read_or_create_id(store: &dyn KeyValueStore, key: &str) -> String {
    if let Some(id) = read(store, key).filter(|id| !id.is_empty()) {
        return id;
    }
    let id = Uuid::new_v4().to_string();
    write(store, key, &id);
    id
}

fn parse_dismissed(raw: &str) -> BTreeSet<String> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(error = %e, "dismissed set is corrupt; starting empty");
        BTreeSet::new()
    })
}

fn persist_dismissed(store: &dyn KeyValueStore, dismissed: &BTreeSet<String>) {
    match serde_json::to_string(dismissed) {
        Ok(raw) => write(store, DISMISSED, &raw),
        Err(e) => warn!(error = %e, "failed to encode dismissed set"),
    }
}
