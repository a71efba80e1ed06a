//! Preference store — persisted preferences and transcript history.
//!
//! Two layers:
//!
//! * [`KeyValueBackend`] — raw string storage under a key. [`FileBackend`]
//!   keeps one JSON file per key in the data directory; [`MemoryBackend`]
//!   keeps everything in a map (tests, ephemeral sessions).
//! * [`PreferenceStore`] — the typed contract the turn controller talks to.
//!   [`KvPreferenceStore`] implements it on top of any backend, encoding
//!   values as JSON.
//!
//! The typed layer never fails outward: read errors degrade to defaults, write
//! errors are logged and dropped.

pub mod backend;
pub mod preference_store;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use backend::{FileBackend, KeyValueBackend, MemoryBackend, StoreError};
pub use preference_store::{
    KvPreferenceStore, PreferenceStore, DEFAULT_HISTORY_LIMIT, HISTORY_KEY, PREFS_KEY,
};
