//! Speech-to-text capability.
//!
//! A [`Transcriber`] turns one complete WAV-framed turn into text. Both
//! implementations are pre-recorded REST APIs: the whole turn is uploaded at
//! once and the best transcript is returned.

pub mod deepgram;
pub mod openai;

pub use deepgram::{DEEPGRAM_DEFAULT_MODEL, DeepgramSTT};
pub use openai::{OPENAI_DEFAULT_STT_MODEL, OpenAISTT};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum STTError {
    #[error("Transcription failed: configuration error: {0}")]
    ConfigurationError(String),

    #[error("Transcription failed: authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Transcription failed: network error: {0}")]
    NetworkError(String),

    #[error("Transcription failed: {0}")]
    ProviderError(String),

    #[error("Transcription failed: invalid response: {0}")]
    InvalidResponse(String),
}

pub type STTResult<T> = Result<T, STTError>;

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a WAV-framed buffer.
    ///
    /// `language` is an ISO code such as `en`. Empty input yields an empty
    /// string without contacting the provider.
    async fn transcribe(&self, wav: Bytes, language: &str) -> STTResult<String>;

    /// Provider name for logs.
    fn provider_name(&self) -> &'static str;
}

/// Reject empty keys before any request is built.
pub(crate) fn require_key(api_key: &str, provider: &str) -> STTResult<()> {
    if api_key.trim().is_empty() {
        return Err(STTError::AuthenticationFailed(format!(
            "{provider} API key is required"
        )));
    }
    Ok(())
}
