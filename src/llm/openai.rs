//! OpenAI-compatible chat-completions backend.
//!
//! `OpenAiClient` calls any OpenAI-compatible `/v1/chat/completions` endpoint
//! — OpenAI, Groq, Ollama (OpenAI mode), LM Studio, vLLM, etc.
//! All connection details come from [`LlmConfig`]; nothing is hardcoded.

use async_trait::async_trait;

use crate::config::LlmConfig;
use crate::conversation::{ConversationRecord, Preferences, Role, ToolInvocation};

use super::client::{context_records, LanguageModel, LlmError, ModelReply};
use super::prompt::PersonaPrompt;
use super::tools::declared_tools;

// ---------------------------------------------------------------------------
// OpenAiClient
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint.
///
/// The declared tools are sent as `function` tools; `tool_calls` in the reply
/// become [`ToolInvocation`]s.
pub struct OpenAiClient {
    client: reqwest::Client,
    config: LlmConfig,
    prompt: PersonaPrompt,
}

impl OpenAiClient {
    /// Build an `OpenAiClient` from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.
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

    pub(crate) fn build_body(
        &self,
        transcript: &[ConversationRecord],
        new_message: &str,
        prefs: &Preferences,
    ) -> serde_json::Value {
        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": self.prompt.build(prefs)
        })];
        for record in context_records(transcript) {
            let role = if record.role == Role::User { "user" } else { "assistant" };
            messages.push(serde_json::json!({ "role": role, "content": record.content }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": new_message }));

        let tools: Vec<serde_json::Value> = declared_tools()
            .into_iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name":        t.name,
                        "description": t.description,
                        "parameters":  t.parameters
                    }
                })
            })
            .collect();

        serde_json::json!({
            "model":       self.config.model,
            "messages":    messages,
            "tools":       tools,
            "stream":      false,
            "temperature": self.config.temperature,
            "max_tokens":  self.config.max_tokens
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    /// The `Authorization: Bearer …` header is attached **only** when
    /// `config.api_key` is a non-empty string, so local providers that require
    /// no authentication work unchanged.
    async fn send(
        &self,
        transcript: &[ConversationRecord],
        new_message: &str,
        prefs: &Preferences,
    ) -> Result<ModelReply, LlmError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = self.build_body(transcript, new_message, prefs);

        let mut req = self.client.post(&url).json(&body);

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(text);
            return Err(LlmError::from_status(status.as_u16(), message));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        parse_completion(&json)
    }
}

/// Pull text and tool calls out of a chat-completions response.
pub(crate) fn parse_completion(json: &serde_json::Value) -> Result<ModelReply, LlmError> {
    let message = &json["choices"][0]["message"];
    if message.is_null() {
        return Err(LlmError::Parse("response has no choices".into()));
    }

    let text = message["content"].as_str().unwrap_or("");

    let tools = message["tool_calls"]
        .as_array()
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| {
                    let name = call["function"]["name"].as_str()?;
                    let args = call["function"]["arguments"]
                        .as_str()
                        .and_then(|raw| serde_json::from_str(raw).ok())
                        .unwrap_or(serde_json::Value::Null);
                    Some(ToolInvocation::from_json(name, args))
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ModelReply::from_parts(text, tools))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
