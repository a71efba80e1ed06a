//! Turn status and the snapshots handed to render sinks.
//!
//! [`TurnStatus`] drives the controller's state machine.  Every change is
//! published as a [`TurnSnapshot`], an owned copy of everything a render sink
//! needs, so the sink never touches controller state directly.

use crate::conversation::{ConversationRecord, Preferences};

// ---------------------------------------------------------------------------
// TurnStatus
// ---------------------------------------------------------------------------

/// States of the conversation turn controller.
///
/// The state machine transitions are:
///
/// ```text
/// Idle ──toggle──▶ Listening ──end / error──▶ Idle
///                  Listening ──result──▶ Processing
/// Idle ──submit──▶ Processing ──reply with text──▶ Speaking ──timer──▶ Idle
///                  Processing ──empty reply / failure──▶ Idle
/// Speaking ──submit──▶ Processing
/// Speaking ──toggle──▶ Listening
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnStatus {
    /// Waiting for input.
    #[default]
    Idle,

    /// A capture session is open.
    Listening,

    /// A language-model request is in flight.
    Processing,

    /// A reply was just received; the speaking indicator is showing.
    Speaking,
}

impl TurnStatus {
    /// Returns `true` while the controller cannot accept a new submission.
    ///
    /// ```
    /// use shohayok::turn::TurnStatus;
    ///
    /// assert!(!TurnStatus::Idle.is_busy());
    /// assert!(!TurnStatus::Listening.is_busy());
    /// assert!(TurnStatus::Processing.is_busy());
    /// assert!(!TurnStatus::Speaking.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(self, TurnStatus::Processing)
    }

    /// A short human-readable label suitable for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            TurnStatus::Idle => "STANDBY",
            TurnStatus::Listening => "LISTENING",
            TurnStatus::Processing => "PROCESSING",
            TurnStatus::Speaking => "SPEAKING",
        }
    }
}

impl std::fmt::Display for TurnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// TurnSnapshot
// ---------------------------------------------------------------------------

/// Owned copy of the controller's observable state at one instant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TurnSnapshot {
    pub status: TurnStatus,
    pub transcript: Vec<ConversationRecord>,
    pub preferences: Preferences,
}

impl TurnSnapshot {
    /// The most recent record, if any.
    pub fn last_record(&self) -> Option<&ConversationRecord> {
        self.transcript.last()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::RecordId;
    use chrono::Utc;

    #[test]
    fn default_status_is_idle() {
        assert_eq!(TurnStatus::default(), TurnStatus::Idle);
    }

    #[test]
    fn labels_are_distinct() {
        let labels = [
            TurnStatus::Idle.label(),
            TurnStatus::Listening.label(),
            TurnStatus::Processing.label(),
            TurnStatus::Speaking.label(),
        ];
        for (i, a) in labels.iter().enumerate() {
            for b in &labels[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn display_matches_label() {
        assert_eq!(TurnStatus::Speaking.to_string(), "SPEAKING");
    }

    #[test]
    fn last_record_of_snapshot() {
        let mut snap = TurnSnapshot::default();
        assert!(snap.last_record().is_none());
        snap.transcript
            .push(ConversationRecord::user(RecordId(7), "hi", Utc::now()));
        assert_eq!(snap.last_record().map(|r| r.id), Some(RecordId(7)));
    }
}
