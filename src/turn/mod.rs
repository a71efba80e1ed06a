//! Conversation turn controller.
//!
//! # Architecture
//!
//! ```text
//! submit_text / toggle_listening / clear_history / update_preferences
//!        │
//!        ▼
//! TurnController  ── owns ──▶ TurnState { status, transcript, preferences }
//!        │                            │
//!        ├─ PreferenceStore (sync)    └─▶ TurnSnapshot ──▶ subscribers
//!        ├─ LanguageModel   (async, one call per turn)
//!        └─ VoiceIo         (capture events via mpsc, fire-and-forget speech)
//! ```

pub mod controller;
pub mod state;

pub use controller::{speaking_duration, TurnController};
pub use state::{TurnSnapshot, TurnStatus};
