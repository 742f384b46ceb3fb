//! Anthropic Messages API (`POST /v1/messages`).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use super::{ChatModel, ChatTurn, GenerationParams, LLMError, LLMResult, Role, require_key};
use crate::core::http::{is_auth_failure, join_url, truncate_body};

pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<&'a ChatTurn>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: AnthropicError,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    message: String,
}

pub struct AnthropicChat {
    http: Client,
    endpoint: String,
    api_key: Zeroizing<String>,
    model: String,
}

impl AnthropicChat {
    pub fn new(
        http: Client,
        base_url: &str,
        api_key: &str,
        model: impl Into<String>,
    ) -> LLMResult<Self> {
        require_key(api_key, "Anthropic")?;
        Ok(Self {
            http,
            endpoint: join_url(base_url, "v1/messages"),
            api_key: Zeroizing::new(api_key.to_string()),
            model: model.into(),
        })
    }
}

/// Split the system prompt out of the turn list; Anthropic takes it separately.
fn split_system(turns: &[ChatTurn]) -> (Option<&str>, Vec<&ChatTurn>) {
    let system = turns
        .iter()
        .find(|t| t.role == Role::System)
        .map(|t| t.content.as_str())
        .filter(|s| !s.is_empty());
    let messages = turns.iter().filter(|t| t.role != Role::System).collect();
    (system, messages)
}

#[async_trait]
impl ChatModel for AnthropicChat {
    async fn complete(&self, turns: &[ChatTurn], params: &GenerationParams) -> LLMResult<String> {
        let (system, messages) = split_system(turns);
        let request = MessagesRequest {
            model: &self.model,
            system,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", self.api_key.as_str())
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LLMError::NetworkError(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<AnthropicErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| truncate_body(&body));
            let message = format!("Anthropic API error ({status}): {detail}");
            return Err(if is_auth_failure(status) {
                LLMError::AuthenticationFailed(message)
            } else {
                LLMError::ProviderError(message)
            });
        }

        let parsed: MessagesResponse = serde_json::from_str(&body)
            .map_err(|e| LLMError::InvalidResponse(format!("Failed to parse response: {e}")))?;
        let content: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();

        debug!(model = %self.model, chars = content.len(), "Anthropic reply received");
        Ok(content)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
