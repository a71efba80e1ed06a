//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.
//! Every section is `#[serde(default)]`, so a settings file only needs the keys
//! it wants to change.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

/// Environment variable that overrides `llm.api_key` when set and non-empty.
pub const API_KEY_ENV: &str = "SHOHAYOK_API_KEY";

// ---------------------------------------------------------------------------
// LlmProvider
// ---------------------------------------------------------------------------

/// Selects which language-model backend answers turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LlmProvider {
    /// Google Gemini `generateContent` REST API.
    Gemini,
    /// Any OpenAI-compatible `/v1/chat/completions` endpoint (OpenAI, Groq,
    /// Ollama in OpenAI mode, LM Studio …).
    OpenAiCompatible,
}

impl Default for LlmProvider {
    fn default() -> Self {
        Self::Gemini
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Connection settings for the language-model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Which backend to use.
    pub provider: LlmProvider,
    /// Base URL of the API endpoint.
    ///
    /// - Gemini: `https://generativelanguage.googleapis.com/v1beta`
    /// - OpenAI: `https://api.openai.com`
    /// - Ollama: `http://localhost:11434`
    pub base_url: String,
    /// API key; `None` is acceptable only for local OpenAI-compatible servers.
    pub api_key: Option<String>,
    /// Model identifier sent to the API.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum seconds to wait for a reply before the turn fails.
    pub timeout_secs: u64,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            api_key: None,
            model: "gemini-2.5-flash".into(),
            temperature: 0.7,
            timeout_secs: 30,
            max_tokens: 512,
        }
    }
}

impl LlmConfig {
    /// Replace the configured key with `key` when it is present and non-blank.
    pub fn with_api_key_override(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()) {
            self.api_key = Some(key);
        }
        self
    }
}

// ---------------------------------------------------------------------------
// AssistantConfig
// ---------------------------------------------------------------------------

/// Persona-level settings that are not user preferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Language the assistant replies in, as an ISO-639-1 code.
    pub language: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            language: "bn".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// VoiceConfig
// ---------------------------------------------------------------------------

/// External programs used for speech playback and capture.
///
/// Leaving a program unset makes that capability unavailable; the assistant
/// still works through text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// BCP-47 language hint for playback and recognition.
    pub language: String,
    /// Text-to-speech program, e.g. `espeak-ng`.  Receives the text as its
    /// last argument.
    pub tts_program: Option<String>,
    /// Arguments selecting a voice for `language`; `{lang}` is substituted.
    /// Dropped on retry when the program rejects the language.
    pub tts_language_args: Vec<String>,
    /// Extra arguments always passed to the TTS program.
    pub tts_args: Vec<String>,
    /// Speech-to-text program.  Must print one transcript line on stdout; on
    /// failure it exits non-zero with a reason code (`no-speech`,
    /// `not-allowed`, `network` …) on stderr.
    pub stt_program: Option<String>,
    /// Arguments for the STT program; `{lang}` is substituted.
    pub stt_args: Vec<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language: "bn-BD".into(),
            tts_program: None,
            tts_language_args: vec!["-v".into(), "{lang}".into()],
            tts_args: Vec::new(),
            stt_program: None,
            stt_args: vec!["--lang".into(), "{lang}".into()],
        }
    }
}

// ---------------------------------------------------------------------------
// TurnConfig
// ---------------------------------------------------------------------------

/// Timing and retention knobs of the turn controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    /// Speaking indicator time per reply character, in milliseconds.
    pub speaking_ms_per_char: u64,
    /// Upper bound on the speaking indicator, in milliseconds.
    pub speaking_max_ms: u64,
    /// Number of most-recent records kept in persisted history and sent to
    /// the model as context.
    pub history_limit: usize,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            speaking_ms_per_char: 50,
            speaking_max_ms: 5_000,
            history_limit: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the platform data directory for preferences and history.
    pub data_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use shohayok::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Language-model backend settings.
    pub llm: LlmConfig,
    /// Persona-level settings.
    pub assistant: AssistantConfig,
    /// Voice playback / capture settings.
    pub voice: VoiceConfig,
    /// Turn controller timing and retention.
    pub turn: TurnConfig,
    /// Preference store location.
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first run).
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Directory the preference store writes to.
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(|| AppPaths::new().data_dir)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
