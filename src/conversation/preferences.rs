//! User preferences: persona names, tone, voice and display settings.
//!
//! Every field has a default, and a stored value that lacks some fields picks
//! the missing ones up from [`Preferences::default`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Tone
// ---------------------------------------------------------------------------

/// Speaking style of the assistant persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Formal,
    Casual,
    Witty,
    /// Calm, efficient, direct; the tactical-OS persona.
    #[serde(alias = "jarvis-style")]
    Jarvis,
}

impl Default for Tone {
    fn default() -> Self {
        Tone::Jarvis
    }
}

impl Tone {
    /// Instruction line describing this tone for the persona preamble.
    pub fn instruction(&self) -> &'static str {
        match self {
            Tone::Formal => "Formal, respectful and precise.",
            Tone::Casual => "Relaxed and friendly, like a trusted colleague.",
            Tone::Witty => "Quick and playful, with light humour, never at the user's expense.",
            Tone::Jarvis => "Calm, efficient, and direct.",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tone::Formal => "formal",
            Tone::Casual => "casual",
            Tone::Witty => "witty",
            Tone::Jarvis => "jarvis",
        };
        f.write_str(s)
    }
}

impl FromStr for Tone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "formal" => Ok(Tone::Formal),
            "casual" => Ok(Tone::Casual),
            "witty" => Ok(Tone::Witty),
            "jarvis" | "jarvis-style" => Ok(Tone::Jarvis),
            other => Err(format!("unknown tone: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// AnimationLevel
// ---------------------------------------------------------------------------

/// How much motion the render sink should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationLevel {
    Low,
    High,
}

impl Default for AnimationLevel {
    fn default() -> Self {
        AnimationLevel::High
    }
}

impl fmt::Display for AnimationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AnimationLevel::Low => "low",
            AnimationLevel::High => "high",
        })
    }
}

impl FromStr for AnimationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(AnimationLevel::Low),
            "high" => Ok(AnimationLevel::High),
            other => Err(format!("unknown animation level: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

/// User configuration consulted at the start of every turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    /// How the assistant addresses the user.
    pub user_name: String,
    /// The assistant's own name.
    pub ai_name: String,
    pub tone: Tone,
    /// Speak replies aloud through the voice adapter.
    pub voice_enabled: bool,
    /// Theme identifier, interpreted only by the render sink.
    pub theme: String,
    pub animation_level: AnimationLevel,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            user_name: "User".into(),
            ai_name: "Shohayok".into(),
            tone: Tone::default(),
            voice_enabled: false,
            theme: "midnight".into(),
            animation_level: AnimationLevel::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
