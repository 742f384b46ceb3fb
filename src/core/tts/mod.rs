//! Text-to-speech capability.

pub mod deepgram;
pub mod openai;

pub use deepgram::DeepgramTTS;
pub use openai::{OPENAI_DEFAULT_TTS_MODEL, OpenAITTS};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::BoxStream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TTSError {
    #[error("Synthesis failed: configuration error: {0}")]
    ConfigurationError(String),

    #[error("Synthesis failed: authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Synthesis failed: network error: {0}")]
    NetworkError(String),

    #[error("Synthesis failed: {0}")]
    ProviderError(String),
}

pub type TTSResult<T> = Result<T, TTSError>;

/// Encoded audio as it arrives from the provider.
pub type AudioStream = BoxStream<'static, TTSResult<Bytes>>;

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Stream encoded audio for `text`. Empty text yields an empty stream.
    async fn synthesize_stream(&self, text: &str) -> TTSResult<AudioStream>;

    /// Complete encoded audio for `text`. Empty text yields empty audio.
    async fn synthesize(&self, text: &str) -> TTSResult<Bytes> {
        let stream = self.synthesize_stream(text).await?;
        collect_audio(stream).await
    }

    fn provider_name(&self) -> &'static str;
}

/// Concatenate a stream in arrival order.
pub async fn collect_audio(mut stream: AudioStream) -> TTSResult<Bytes> {
    let mut audio = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        audio.extend_from_slice(&chunk?);
    }
    Ok(audio.freeze())
}

/// Turn a successful HTTP response body into an [`AudioStream`].
pub(crate) fn response_stream(response: reqwest::Response) -> AudioStream {
    response
        .bytes_stream()
        .map(|chunk| chunk.map_err(|e| TTSError::NetworkError(format!("Audio stream failed: {e}"))))
        .boxed()
}

pub(crate) fn require_key(api_key: &str, provider: &str) -> TTSResult<()> {
    if api_key.trim().is_empty() {
        return Err(TTSError::AuthenticationFailed(format!(
            "{provider} API key is required"
        )));
    }
    Ok(())
}
