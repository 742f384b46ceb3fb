//! OpenAI-compatible chat completions.
//!
//! OpenAI, Groq, DeepSeek and Google Gemini all accept the same
//! `POST {base}/chat/completions` request shape, so one client serves them
//! with a different base URL and key.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use super::{ChatModel, ChatTurn, GenerationParams, LLMError, LLMResult, require_key};
use crate::core::credentials::ProviderId;
use crate::core::http::{describe_failure, is_auth_failure, join_url};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAICompatibleChat {
    http: Client,
    provider: ProviderId,
    endpoint: String,
    api_key: Zeroizing<String>,
    model: String,
}

impl OpenAICompatibleChat {
    pub fn new(
        http: Client,
        provider: ProviderId,
        base_url: &str,
        api_key: &str,
        model: impl Into<String>,
    ) -> LLMResult<Self> {
        require_key(api_key, provider.display_name())?;
        let model = model.into();
        if model.trim().is_empty() {
            return Err(LLMError::ConfigurationError("Model is required".to_string()));
        }
        Ok(Self {
            http,
            provider,
            endpoint: join_url(base_url, "chat/completions"),
            api_key: Zeroizing::new(api_key.to_string()),
            model,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAICompatibleChat {
    async fn complete(&self, turns: &[ChatTurn], params: &GenerationParams) -> LLMResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: turns,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key.as_str()))
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
            let message = describe_failure(self.provider.display_name(), status, &body);
            return Err(if is_auth_failure(status) {
                LLMError::AuthenticationFailed(message)
            } else {
                LLMError::ProviderError(message)
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| LLMError::InvalidResponse(format!("Failed to parse response: {e}")))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::InvalidResponse("Response has no choices".to_string()))?;
        let content = choice.message.content.unwrap_or_default();

        debug!(
            provider = %self.provider,
            model = %self.model,
            chars = content.len(),
            "Chat completion received"
        );
        Ok(content)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
