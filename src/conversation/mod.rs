//! Conversation data model.
//!
//! * [`ConversationRecord`] — one utterance in the transcript (user, model or
//!   surfaced failure), with any tool invocations the model attached to it.
//! * [`Preferences`] — the user-editable persona / voice / display settings that
//!   shape every turn.
//!
//! Both types are plain serde data so the preference store can persist them as
//! JSON without knowing anything about their meaning.

pub mod preferences;
pub mod record;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use preferences::{AnimationLevel, Preferences, Tone};
pub use record::{ConversationRecord, RecordId, Role, ToolInvocation};
