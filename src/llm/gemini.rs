//! Google Gemini backend.
//!
//! Calls `{base_url}/models/{model}:generateContent` with the persona preamble
//! as `systemInstruction`, the filtered transcript as `contents`, and the
//! declared tools as `functionDeclarations`.  Text parts of the first candidate
//! are concatenated; `functionCall` parts become [`ToolInvocation`]s.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::conversation::{ConversationRecord, Preferences, Role, ToolInvocation};

use super::client::{context_records, LanguageModel, LlmError, ModelReply};
use super::prompt::PersonaPrompt;
use super::tools::declared_tools;

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

/// [`LanguageModel`] backed by the Gemini REST API.
///
/// The API key travels in the `x-goog-api-key` header, never in the URL.
pub struct GeminiClient {
    client: reqwest::Client,
    config: LlmConfig,
    prompt: PersonaPrompt,
}

impl GeminiClient {
    /// Build from config; `language` selects the reply language of the persona.
    pub fn from_config(config: &LlmConfig, language: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
            prompt: PersonaPrompt::new(language),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    pub(crate) fn build_request(
        &self,
        transcript: &[ConversationRecord],
        new_message: &str,
        prefs: &Preferences,
    ) -> GenerateContentRequest {
        let mut contents: Vec<Content> = context_records(transcript)
            .map(|r| Content {
                role: (if r.role == Role::User { "user" } else { "model" }).to_string(),
                parts: vec![Part::text(&r.content)],
            })
            .collect();
        contents.push(Content {
            role: "user".into(),
            parts: vec![Part::text(new_message)],
        });

        let function_declarations = declared_tools()
            .into_iter()
            .map(|t| FunctionDeclaration {
                name: t.name.to_string(),
                description: t.description.to_string(),
                parameters: t.parameters,
            })
            .collect();

        GenerateContentRequest {
            system_instruction: SystemInstruction {
                parts: vec![Part::text(&self.prompt.build(prefs))],
            },
            contents,
            tools: vec![ToolSet {
                function_declarations,
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_tokens,
            },
        }
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn send(
        &self,
        transcript: &[ConversationRecord],
        new_message: &str,
        prefs: &Preferences,
    ) -> Result<ModelReply, LlmError> {
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        let body = self.build_request(transcript, new_message, prefs);
        log::debug!(
            "llm: gemini request model={} contents={}",
            self.config.model,
            body.contents.len()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        parse_response(parsed)
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    system_instruction: SystemInstruction,
    contents: Vec<Content>,
    tools: Vec<ToolSet>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolSet {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    reason: Option<String>,
}

/// Status / reason codes Gemini uses for a missing, invalid or forbidden key.
/// A bad key arrives as HTTP 400 `INVALID_ARGUMENT` with reason
/// `API_KEY_INVALID`, so the HTTP status alone is not enough.
const CREDENTIAL_CODES: &[&str] = &[
    "API_KEY_INVALID",
    "API_KEY_EXPIRED",
    "PERMISSION_DENIED",
    "UNAUTHENTICATED",
];

// ---------------------------------------------------------------------------
// Response handling
// ---------------------------------------------------------------------------

pub(crate) fn parse_response(response: GenerateContentResponse) -> Result<ModelReply, LlmError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(LlmError::BadRequest(format!("prompt blocked: {reason}")));
        }
        return Ok(ModelReply::default());
    };

    let mut text = String::new();
    let mut tools = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(t) = part.text {
            text.push_str(&t);
        }
        if let Some(call) = part.function_call {
            tools.push(ToolInvocation::from_json(call.name, call.args));
        }
    }

    Ok(ModelReply::from_parts(&text, tools))
}

/// Map a non-success response to an [`LlmError`], recognising credential
/// rejections by their Gemini status or reason code.
fn classify_error(status: u16, body: &str) -> LlmError {
    let message = error_message(body);
    let credential = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let reasons = wrapper.error.details.into_iter().filter_map(|d| d.reason);
            wrapper
                .error
                .status
                .into_iter()
                .chain(reasons)
                .any(|code| CREDENTIAL_CODES.contains(&code.as_str()))
        })
        .unwrap_or(false);

    if credential {
        LlmError::Auth(message)
    } else {
        LlmError::from_status(status, message)
    }
}

/// Extract `STATUS: message` from a Gemini error body, or fall back to the raw
/// body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let status = wrapper.error.status.unwrap_or_default();
            let message = wrapper.error.message.unwrap_or_else(|| body.to_string());
            if status.is_empty() {
                message
            } else {
                format!("{status}: {message}")
            }
        })
        .unwrap_or_else(|_| body.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
