//! Core [`LanguageModel`] trait, reply type and error taxonomy.

use async_trait::async_trait;
use thiserror::Error;

use crate::conversation::{ConversationRecord, Preferences, ToolInvocation};

/// Reply text used when the model requested tools but said nothing.
pub const TOOL_CONFIRMATION: &str = "নির্দেশ কার্যকর করা হচ্ছে, স্যার।";

// ---------------------------------------------------------------------------
// FailureKind
// ---------------------------------------------------------------------------

/// Coarse classification of a failed model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The call could not complete (connection, DNS, timeout).
    Transport,
    /// The credential was missing or rejected.
    Auth,
    /// The service refused the request: malformed, rate-limited, overloaded,
    /// or answered with something unreadable.
    Request,
}

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur while asking the model for a reply.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key is configured for a backend that needs one.
    #[error("API key is not configured")]
    MissingApiKey,

    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Network(String),

    /// The request did not complete within the configured timeout.
    #[error("LLM request timed out")]
    Timeout,

    /// HTTP 401 / 403.
    #[error("credential rejected: {0}")]
    Auth(String),

    /// Any other 4xx, or a reply the service itself flagged as refused.
    #[error("request rejected: {0}")]
    BadRequest(String),

    /// HTTP 429.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// HTTP 5xx.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse LLM response: {0}")]
    Parse(String),

    /// The request task died (panicked or was cancelled) before answering.
    #[error("LLM request interrupted: {0}")]
    Interrupted(String),
}

impl LlmError {
    /// Map a non-success HTTP status and its (already extracted) message.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => LlmError::Auth(message),
            429 => LlmError::RateLimited(message),
            500..=599 => LlmError::Server { status, message },
            _ => LlmError::BadRequest(message),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            LlmError::Network(_) | LlmError::Timeout | LlmError::Interrupted(_) => {
                FailureKind::Transport
            }
            LlmError::MissingApiKey | LlmError::Auth(_) => FailureKind::Auth,
            LlmError::BadRequest(_)
            | LlmError::RateLimited(_)
            | LlmError::Server { .. }
            | LlmError::Parse(_) => FailureKind::Request,
        }
    }

    /// One human-readable reason, suitable for showing in the transcript.
    ///
    /// Never contains credentials; no trailing punctuation.
    pub fn user_message(&self) -> String {
        match self {
            LlmError::MissingApiKey => "API key configuration missing".into(),
            LlmError::Network(detail) => format!("Connection to the model service failed ({detail})"),
            LlmError::Timeout => "The model service did not answer in time".into(),
            LlmError::Auth(_) => "Access denied by the model service, check the API key".into(),
            LlmError::BadRequest(detail) => format!("The model service rejected the request ({detail})"),
            LlmError::RateLimited(_) => "Rate limit reached, try again shortly".into(),
            LlmError::Server { status, .. } => {
                format!("The model service is unavailable (HTTP {status})")
            }
            LlmError::Parse(_) => "Unreadable reply from the model service".into(),
            LlmError::Interrupted(_) => "The model request was interrupted".into(),
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else if e.is_decode() {
            LlmError::Parse(e.to_string())
        } else {
            LlmError::Network(e.without_url().to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ModelReply
// ---------------------------------------------------------------------------

/// Generated text plus any tool invocations the model requested.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelReply {
    pub text: String,
    pub tool_invocations: Vec<ToolInvocation>,
}

impl ModelReply {
    /// Assemble a reply from raw parts.
    ///
    /// Text is trimmed.  When tools were requested but the text is empty, the
    /// text becomes [`TOOL_CONFIRMATION`] so a reply with actions is never
    /// silent.
    pub fn from_parts(text: &str, tool_invocations: Vec<ToolInvocation>) -> Self {
        let text = text.trim();
        let text = if text.is_empty() && !tool_invocations.is_empty() {
            TOOL_CONFIRMATION.to_string()
        } else {
            text.to_string()
        };
        Self {
            text,
            tool_invocations,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_invocations: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// LanguageModel trait
// ---------------------------------------------------------------------------

/// Async interface to a remote language model.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn LanguageModel>`.
///
/// # Contract
///
/// * `transcript` is the conversation *before* `new_message`; implementations
///   send only [`context_records`] of it.
/// * A persona preamble is derived from `prefs` on every call.
/// * Every failure maps to exactly one [`LlmError`]; nothing is retried.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn send(
        &self,
        transcript: &[ConversationRecord],
        new_message: &str,
        prefs: &Preferences,
    ) -> Result<ModelReply, LlmError>;
}

/// The records that form model context: no system records, no failures.
pub fn context_records(
    transcript: &[ConversationRecord],
) -> impl Iterator<Item = &ConversationRecord> {
    transcript.iter().filter(|r| r.is_context())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
