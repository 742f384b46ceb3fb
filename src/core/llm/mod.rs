//! Chat generation capability and per-session conversation state.

pub mod anthropic;
mod conversation;
pub mod openai;

pub use anthropic::{ANTHROPIC_API_VERSION, AnthropicChat};
pub use conversation::{Conversation, PendingExchange, context_prompt};
pub use openai::OpenAICompatibleChat;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Output token cap for every reply.
pub const DEFAULT_MAX_TOKENS: u32 = 500;

/// Sampling temperature for every reply.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Error)]
pub enum LLMError {
    #[error("Generation failed: configuration error: {0}")]
    ConfigurationError(String),

    #[error("Generation failed: authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Generation failed: network error: {0}")]
    NetworkError(String),

    #[error("Generation failed: {0}")]
    ProviderError(String),

    #[error("Generation failed: invalid response: {0}")]
    InvalidResponse(String),
}

pub type LLMResult<T> = Result<T, LLMError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Produce the next assistant reply for `turns`.
    ///
    /// `turns` starts with the system turn. A provider that returns no
    /// content yields an empty string.
    async fn complete(&self, turns: &[ChatTurn], params: &GenerationParams) -> LLMResult<String>;

    /// Model identifier for logs.
    fn model_id(&self) -> &str;
}

pub(crate) fn require_key(api_key: &str, provider: &str) -> LLMResult<()> {
    if api_key.trim().is_empty() {
        return Err(LLMError::AuthenticationFailed(format!(
            "{provider} API key is required"
        )));
    }
    Ok(())
}
