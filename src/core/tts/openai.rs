//! OpenAI speech (`POST /audio/speech`).

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::{AudioStream, Synthesizer, TTSError, TTSResult, require_key, response_stream};
use crate::core::http::{describe_failure, is_auth_failure, join_url};

pub const OPENAI_DEFAULT_TTS_MODEL: &str = "tts-1";
const DEFAULT_VOICE: &str = "alloy";
const VOICES: [&str; 11] = [
    "alloy", "ash", "ballad", "coral", "echo", "fable", "onyx", "nova", "sage", "shimmer",
    "verse",
];

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

pub struct OpenAITTS {
    http: Client,
    endpoint: String,
    api_key: Zeroizing<String>,
    model: String,
    voice: &'static str,
}

impl OpenAITTS {
    /// Agents configured with another provider's voice name fall back to `alloy`.
    pub fn new(http: Client, base_url: &str, api_key: &str, voice: &str) -> TTSResult<Self> {
        require_key(api_key, "OpenAI")?;
        let normalized = voice.trim().to_lowercase();
        let voice = VOICES
            .iter()
            .copied()
            .find(|v| *v == normalized)
            .unwrap_or_else(|| {
                warn!(requested = %voice, fallback = DEFAULT_VOICE, "Unknown OpenAI voice");
                DEFAULT_VOICE
            });
        Ok(Self {
            http,
            endpoint: join_url(base_url, "audio/speech"),
            api_key: Zeroizing::new(api_key.to_string()),
            model: OPENAI_DEFAULT_TTS_MODEL.to_string(),
            voice,
        })
    }
}

#[async_trait]
impl Synthesizer for OpenAITTS {
    async fn synthesize_stream(&self, text: &str) -> TTSResult<AudioStream> {
        if text.is_empty() {
            return Ok(stream::empty().boxed());
        }

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key.as_str()))
            .json(&SpeechRequest {
                model: &self.model,
                input: text,
                voice: self.voice,
                response_format: "mp3",
            })
            .send()
            .await
            .map_err(|e| TTSError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = describe_failure("OpenAI", status, &body);
            return Err(if is_auth_failure(status) {
                TTSError::AuthenticationFailed(message)
            } else {
                TTSError::ProviderError(message)
            });
        }

        debug!(voice = self.voice, chars = text.len(), "OpenAI speech stream started");
        Ok(response_stream(response))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_selection() {
        let tts = OpenAITTS::new(Client::new(), "https://api.openai.com/v1", "sk", "Nova").unwrap();
        assert_eq!(tts.voice, "nova");

        let tts =
            OpenAITTS::new(Client::new(), "https://api.openai.com/v1", "sk", "aura-asteria-en")
                .unwrap();
        assert_eq!(tts.voice, "alloy");
        assert_eq!(tts.endpoint, "https://api.openai.com/v1/audio/speech");
    }

    #[test]
    fn test_request_shape() {
        let json = serde_json::to_value(SpeechRequest {
            model: "tts-1",
            input: "hi",
            voice: "alloy",
            response_format: "mp3",
        })
        .unwrap();
        assert_eq!(json["input"], "hi");
        assert_eq!(json["response_format"], "mp3");
    }
}
