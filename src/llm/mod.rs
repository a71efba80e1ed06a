//! Language-model client module.
//!
//! This module provides:
//! * [`LanguageModel`] — async trait implemented by every backend.
//! * [`GeminiClient`] — Google Gemini `generateContent` backend.
//! * [`OpenAiClient`] — OpenAI-compatible chat-completions backend.
//! * [`PersonaPrompt`] — builds the persona preamble from preferences.
//! * [`declared_tools`] — the tools offered to the model.
//! * [`LlmError`] / [`FailureKind`] — failure taxonomy.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use shohayok::config::AppConfig;
//! use shohayok::conversation::Preferences;
//! use shohayok::llm::{from_config, LanguageModel};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let model = from_config(&config);
//!
//!     match model.send(&[], "Chrome open koro", &Preferences::default()).await {
//!         Ok(reply) => println!("{} ({} tools)", reply.text, reply.tool_invocations.len()),
//!         Err(e) => eprintln!("{}", e.user_message()),
//!     }
//! }
//! ```

pub mod client;
pub mod gemini;
pub mod openai;
pub mod prompt;
pub mod tools;

use std::sync::Arc;

use crate::config::{AppConfig, LlmProvider};

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{context_records, FailureKind, LanguageModel, LlmError, ModelReply, TOOL_CONFIRMATION};
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use prompt::PersonaPrompt;
pub use tools::{declared_tools, ToolDeclaration};

/// Construct the backend selected by `config.llm.provider`.
pub fn from_config(config: &AppConfig) -> Arc<dyn LanguageModel> {
    let language = config.assistant.language.as_str();
    match config.llm.provider {
        LlmProvider::Gemini => Arc::new(GeminiClient::from_config(&config.llm, language)),
        LlmProvider::OpenAiCompatible => Arc::new(OpenAiClient::from_config(&config.llm, language)),
    }
}
