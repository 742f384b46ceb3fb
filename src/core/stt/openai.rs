//! OpenAI Whisper transcription (`POST /audio/transcriptions`).

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;
use zeroize::Zeroizing;

use super::{STTError, STTResult, Transcriber, require_key};
use crate::core::http::{describe_failure, is_auth_failure, join_url};

pub const OPENAI_DEFAULT_STT_MODEL: &str = "whisper-1";

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

pub struct OpenAISTT {
    http: Client,
    endpoint: String,
    api_key: Zeroizing<String>,
    model: String,
}

impl OpenAISTT {
    /// `base_url` includes the API version, e.g. `https://api.openai.com/v1`.
    pub fn new(http: Client, base_url: &str, api_key: &str) -> STTResult<Self> {
        require_key(api_key, "OpenAI")?;
        Ok(Self {
            http,
            endpoint: join_url(base_url, "audio/transcriptions"),
            api_key: Zeroizing::new(api_key.to_string()),
            model: OPENAI_DEFAULT_STT_MODEL.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl Transcriber for OpenAISTT {
    async fn transcribe(&self, wav: Bytes, language: &str) -> STTResult<String> {
        if wav.is_empty() {
            return Ok(String::new());
        }

        let file_part = Part::bytes(wav.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| STTError::ConfigurationError(format!("Invalid MIME type: {e}")))?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("response_format", "json");
        if !language.is_empty() {
            form = form.text("language", language.to_string());
        }

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key.as_str()))
            .multipart(form)
            .send()
            .await
            .map_err(|e| STTError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| STTError::NetworkError(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = describe_failure("OpenAI", status, &body);
            return Err(if is_auth_failure(status) {
                STTError::AuthenticationFailed(message)
            } else {
                STTError::ProviderError(message)
            });
        }

        let parsed: TranscriptionResponse = serde_json::from_str(&body)
            .map_err(|e| STTError::InvalidResponse(format!("Failed to parse response: {e}")))?;
        debug!(chars = parsed.text.len(), "Whisper transcription complete");
        Ok(parsed.text)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let stt = OpenAISTT::new(Client::new(), "https://api.openai.com/v1", "sk").unwrap();
        assert_eq!(stt.endpoint, "https://api.openai.com/v1/audio/transcriptions");
        assert_eq!(stt.model, "whisper-1");
    }

    #[test]
    fn test_missing_key() {
        let err = OpenAISTT::new(Client::new(), "https://api.openai.com/v1", "")
            .err()
            .unwrap();
        assert!(matches!(err, STTError::AuthenticationFailed(_)));
    }

    #[test]
    fn test_parse_response() {
        let parsed: TranscriptionResponse = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert_eq!(parsed.text, "hi");
    }
}
