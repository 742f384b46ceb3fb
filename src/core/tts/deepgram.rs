//! Deepgram Aura speech (`POST /v1/speak`).

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use reqwest::Client;
use serde_json::json;
use tracing::debug;
use zeroize::Zeroizing;

use super::{AudioStream, Synthesizer, TTSError, TTSResult, require_key, response_stream};
use crate::core::http::{describe_failure, is_auth_failure, join_url};

pub struct DeepgramTTS {
    http: Client,
    endpoint: String,
    api_key: Zeroizing<String>,
    voice: String,
}

impl DeepgramTTS {
    /// `voice` is a Deepgram model such as `aura-asteria-en`.
    pub fn new(http: Client, base_url: &str, api_key: &str, voice: &str) -> TTSResult<Self> {
        require_key(api_key, "Deepgram")?;
        if voice.trim().is_empty() {
            return Err(TTSError::ConfigurationError("Voice is required".to_string()));
        }
        Ok(Self {
            http,
            endpoint: join_url(base_url, "v1/speak"),
            api_key: Zeroizing::new(api_key.to_string()),
            voice: voice.to_string(),
        })
    }
}

#[async_trait]
impl Synthesizer for DeepgramTTS {
    async fn synthesize_stream(&self, text: &str) -> TTSResult<AudioStream> {
        if text.is_empty() {
            return Ok(stream::empty().boxed());
        }

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("model", self.voice.as_str())])
            .header("Authorization", format!("Token {}", self.api_key.as_str()))
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(|e| TTSError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = describe_failure("Deepgram", status, &body);
            return Err(if is_auth_failure(status) {
                TTSError::AuthenticationFailed(message)
            } else {
                TTSError::ProviderError(message)
            });
        }

        debug!(voice = %self.voice, chars = text.len(), "Deepgram speech stream started");
        Ok(response_stream(response))
    }

    fn provider_name(&self) -> &'static str {
        "deepgram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction() {
        let tts =
            DeepgramTTS::new(Client::new(), "https://api.deepgram.com", "dg", "aura-asteria-en")
                .unwrap();
        assert_eq!(tts.endpoint, "https://api.deepgram.com/v1/speak");
        assert!(DeepgramTTS::new(Client::new(), "https://api.deepgram.com", "", "v").is_err());
        assert!(DeepgramTTS::new(Client::new(), "https://api.deepgram.com", "dg", "").is_err());
    }

    #[tokio::test]
    async fn test_empty_text_no_request() {
        let tts = DeepgramTTS::new(Client::new(), "http://127.0.0.1:1", "dg", "aura").unwrap();
        assert!(tts.synthesize("").await.unwrap().is_empty());
    }
}
