//! Typed preference / history store on top of a [`KeyValueBackend`].

use crate::conversation::{ConversationRecord, Preferences};

use super::backend::{KeyValueBackend, StoreError};

/// Key holding the serialised [`Preferences`].
pub const PREFS_KEY: &str = "shohayok_prefs";
/// Key holding the serialised transcript.
pub const HISTORY_KEY: &str = "shohayok_history";
/// Number of most-recent records kept by [`PreferenceStore::save_history`].
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

// ---------------------------------------------------------------------------
// PreferenceStore trait
// ---------------------------------------------------------------------------

/// Persistence contract used by the turn controller.
///
/// Every operation is synchronous and infallible from the caller's point of
/// view.  Implementations swallow (and log) internal failures:
///
/// * reads degrade to [`Preferences::default`] / an empty history,
/// * writes and clears become no-ops.
pub trait PreferenceStore: Send + Sync {
    fn get_preferences(&self) -> Preferences;
    fn save_preferences(&self, prefs: &Preferences);
    fn get_history(&self) -> Vec<ConversationRecord>;
    /// Persist `records`, keeping only the most recent bounded window.
    fn save_history(&self, records: &[ConversationRecord]);
    fn clear_history(&self);
}

// ---------------------------------------------------------------------------
// KvPreferenceStore
// ---------------------------------------------------------------------------

/// JSON-encoding [`PreferenceStore`] over any [`KeyValueBackend`].
///
/// ```rust
/// use shohayok::conversation::Preferences;
/// use shohayok::store::{KvPreferenceStore, MemoryBackend, PreferenceStore};
///
/// let store = KvPreferenceStore::new(MemoryBackend::new());
/// assert_eq!(store.get_preferences(), Preferences::default());
/// assert!(store.get_history().is_empty());
/// ```
pub struct KvPreferenceStore<B: KeyValueBackend> {
    backend: B,
    history_limit: usize,
}

impl<B: KeyValueBackend> KvPreferenceStore<B> {
    /// Store keeping the last [`DEFAULT_HISTORY_LIMIT`] records.
    pub fn new(backend: B) -> Self {
        Self::with_history_limit(backend, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(backend: B, history_limit: usize) -> Self {
        Self {
            backend,
            history_limit,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    fn try_get_preferences(&self) -> Result<Option<Preferences>, StoreError> {
        match self.backend.read(PREFS_KEY)? {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    fn try_get_history(&self) -> Result<Vec<ConversationRecord>, StoreError> {
        match self.backend.read(HISTORY_KEY)? {
            Some(data) => Ok(serde_json::from_str(&data)?),
            None => Ok(Vec::new()),
        }
    }

    fn try_save_history(&self, records: &[ConversationRecord]) -> Result<(), StoreError> {
        let start = records.len().saturating_sub(self.history_limit);
        let data = serde_json::to_string(&records[start..])?;
        self.backend.write(HISTORY_KEY, &data)
    }
}

impl<B: KeyValueBackend> PreferenceStore for KvPreferenceStore<B> {
    fn get_preferences(&self) -> Preferences {
        match self.try_get_preferences() {
            Ok(Some(prefs)) => prefs,
            Ok(None) => Preferences::default(),
            Err(e) => {
                log::warn!("store: failed to read preferences ({e}); using defaults");
                Preferences::default()
            }
        }
    }

    fn save_preferences(&self, prefs: &Preferences) {
        let result = serde_json::to_string(prefs)
            .map_err(StoreError::from)
            .and_then(|data| self.backend.write(PREFS_KEY, &data));
        if let Err(e) = result {
            log::warn!("store: failed to save preferences: {e}");
        }
    }

    fn get_history(&self) -> Vec<ConversationRecord> {
        self.try_get_history().unwrap_or_else(|e| {
            log::warn!("store: failed to read history ({e}); starting empty");
            Vec::new()
        })
    }

    fn save_history(&self, records: &[ConversationRecord]) {
        if let Err(e) = self.try_save_history(records) {
            log::warn!("store: failed to save history: {e}");
        }
    }

    fn clear_history(&self) {
        if let Err(e) = self.backend.remove(HISTORY_KEY) {
            log::warn!("store: failed to clear history: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
