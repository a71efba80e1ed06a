//! Transcript records and tool invocations.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RecordId
// ---------------------------------------------------------------------------

/// Identifier of a [`ConversationRecord`].
///
/// Ids are handed out by the turn controller from a monotonic counter, so a
/// larger id always means a later record within one transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    /// The id that follows `self`; saturates at `u64::MAX`.
    pub fn next(self) -> Self {
        RecordId(self.0.saturating_add(1))
    }

    /// The id that follows `self`, or `None` when ids are exhausted.
    pub fn checked_next(self) -> Option<Self> {
        self.0.checked_add(1).map(RecordId)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Who produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text typed or spoken by the user.
    User,
    /// A reply from the language model, or a surfaced failure.
    Model,
    /// Reserved for prompt construction; never stored in the transcript.
    System,
}

// ---------------------------------------------------------------------------
// ToolInvocation
// ---------------------------------------------------------------------------

/// A structured action requested by the model.
///
/// Purely informational: nothing in this crate executes tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Declared tool name, e.g. `openApp`.
    pub name: String,
    /// Argument mapping as returned by the model.
    #[serde(default)]
    pub args: BTreeMap<String, serde_json::Value>,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, args: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Build from a JSON object; non-object values yield empty arguments.
    pub fn from_json(name: impl Into<String>, args: serde_json::Value) -> Self {
        let args = match args {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        };
        Self::new(name, args)
    }

    /// String value of argument `key`, if present and a string.
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(|v| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// ConversationRecord
// ---------------------------------------------------------------------------

/// One utterance in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub id: RecordId,
    pub role: Role,
    /// Opaque text; may be any script.
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// `true` when this record reports a failure rather than a model reply.
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_invocations: Vec<ToolInvocation>,
}

impl ConversationRecord {
    /// A record of user input.
    pub fn user(id: RecordId, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            role: Role::User,
            content: content.into(),
            timestamp,
            is_error: false,
            tool_invocations: Vec::new(),
        }
    }

    /// A genuine model reply.
    pub fn model(
        id: RecordId,
        content: impl Into<String>,
        tool_invocations: Vec<ToolInvocation>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            role: Role::Model,
            content: content.into(),
            timestamp,
            is_error: false,
            tool_invocations,
        }
    }

    /// A surfaced failure, attributed to the model side of the conversation.
    pub fn error(id: RecordId, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            role: Role::Model,
            content: content.into(),
            timestamp,
            is_error: true,
            tool_invocations: Vec::new(),
        }
    }

    /// Whether this record should be sent to the model as conversation context.
    ///
    /// System records and surfaced failures are never part of the context.
    pub fn is_context(&self) -> bool {
        self.role != Role::System && !self.is_error
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
