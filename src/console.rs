//! Terminal front-end: input commands and transcript rendering.
//!
//! * [`ConsoleCommand`] — one parsed input line.  Plain text is submitted;
//!   lines starting with `/` map onto the controller operations.
//! * [`ConsoleView`] — turns the stream of [`TurnSnapshot`]s into the lines
//!   to print, showing each record once and each status change once.

use thiserror::Error;

use crate::conversation::{AnimationLevel, ConversationRecord, Preferences, Role, Tone};
use crate::turn::{TurnSnapshot, TurnStatus};

/// Shown for `/help` and after an unknown command.
pub const HELP: &str = "\
commands:
  <text>                 send a message
  /listen                start voice capture
  /clear                 purge the conversation history
  /prefs                 show preferences
  /set <field> <value>   change a preference (user, ai, tone, voice, theme, animation)
  /quit                  exit";

// ---------------------------------------------------------------------------
// ConsoleError
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("unknown command /{0}")]
    UnknownCommand(String),

    #[error("usage: /set <field> <value>")]
    MissingArgument,

    #[error("unknown preference field: {0}")]
    UnknownField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

// ---------------------------------------------------------------------------
// ConsoleCommand
// ---------------------------------------------------------------------------

/// One line of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Blank line.
    Nothing,
    Submit(String),
    Listen,
    Clear,
    ShowPreferences,
    Set { field: String, value: String },
    Help,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(if line.is_empty() {
                ConsoleCommand::Nothing
            } else {
                ConsoleCommand::Submit(line.to_string())
            });
        };

        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };

        match name {
            "listen" | "l" => Ok(ConsoleCommand::Listen),
            "clear" => Ok(ConsoleCommand::Clear),
            "prefs" => Ok(ConsoleCommand::ShowPreferences),
            "help" | "?" => Ok(ConsoleCommand::Help),
            "quit" | "exit" | "q" => Ok(ConsoleCommand::Quit),
            "set" => {
                let (field, value) = args
                    .split_once(char::is_whitespace)
                    .ok_or(ConsoleError::MissingArgument)?;
                Ok(ConsoleCommand::Set {
                    field: field.to_string(),
                    value: value.trim().to_string(),
                })
            }
            other => Err(ConsoleError::UnknownCommand(other.to_string())),
        }
    }
}

/// Return `prefs` with `field` set to `value`.
pub fn apply_setting(
    prefs: &Preferences,
    field: &str,
    value: &str,
) -> Result<Preferences, ConsoleError> {
    let invalid = |message: String| ConsoleError::InvalidValue {
        field: field.to_string(),
        message,
    };

    let mut updated = prefs.clone();
    match field {
        "user" | "user-name" | "userName" => updated.user_name = value.to_string(),
        "ai" | "ai-name" | "aiName" => updated.ai_name = value.to_string(),
        "tone" => updated.tone = value.parse::<Tone>().map_err(invalid)?,
        "voice" | "voice-enabled" | "voiceEnabled" => {
            updated.voice_enabled = match value.to_ascii_lowercase().as_str() {
                "on" | "true" | "yes" | "1" => true,
                "off" | "false" | "no" | "0" => false,
                other => return Err(invalid(format!("expected on/off, got {other}"))),
            }
        }
        "theme" => updated.theme = value.to_string(),
        "animation" | "animation-level" | "animationLevel" => {
            updated.animation_level = value.parse::<AnimationLevel>().map_err(invalid)?
        }
        other => return Err(ConsoleError::UnknownField(other.to_string())),
    }
    Ok(updated)
}

/// Multi-line description of `prefs` for `/prefs`.
pub fn describe_preferences(prefs: &Preferences) -> String {
    format!(
        "user:      {}\nai:        {}\ntone:      {}\nvoice:     {}\ntheme:     {}\nanimation: {}",
        prefs.user_name,
        prefs.ai_name,
        prefs.tone,
        if prefs.voice_enabled { "on" } else { "off" },
        prefs.theme,
        prefs.animation_level,
    )
}

// ---------------------------------------------------------------------------
// ConsoleView
// ---------------------------------------------------------------------------

/// Render state for the terminal sink.
#[derive(Debug, Default)]
pub struct ConsoleView {
    status: Option<TurnStatus>,
    printed: usize,
}

impl ConsoleView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines to print for `snapshot`: records not yet shown, then the status
    /// if it changed.
    pub fn render(&mut self, snapshot: &TurnSnapshot) -> Vec<String> {
        let mut lines = Vec::new();

        if snapshot.transcript.len() < self.printed {
            lines.push("-- history cleared --".to_string());
            self.printed = 0;
        }
        for record in &snapshot.transcript[self.printed..] {
            lines.extend(format_record(record, &snapshot.preferences));
        }
        self.printed = snapshot.transcript.len();

        if self.status != Some(snapshot.status) {
            if self.status.is_some() || snapshot.status != TurnStatus::Idle {
                lines.push(format!("[{}]", snapshot.status));
            }
            self.status = Some(snapshot.status);
        }
        lines
    }

    /// Mark the already-loaded history as shown, after printing it.
    pub fn replay(&mut self, snapshot: &TurnSnapshot) -> Vec<String> {
        self.status = Some(snapshot.status);
        self.printed = snapshot.transcript.len();
        snapshot
            .transcript
            .iter()
            .flat_map(|r| format_record(r, &snapshot.preferences))
            .collect()
    }
}

/// A record as terminal lines: the utterance, then one line per tool call.
pub fn format_record(record: &ConversationRecord, prefs: &Preferences) -> Vec<String> {
    let speaker = match record.role {
        Role::User => prefs.user_name.as_str(),
        Role::Model | Role::System => prefs.ai_name.as_str(),
    };
    let mut lines = if record.is_error {
        vec![format!("!! {}", record.content)]
    } else {
        vec![format!("{speaker} > {}", record.content)]
    };
    for tool in &record.tool_invocations {
        let args = serde_json::to_string(&tool.args).unwrap_or_default();
        lines.push(format!("[tool] {} {}", tool.name, args));
    }
    lines
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
