//! Deepgram pre-recorded transcription (`POST /v1/listen`).

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use zeroize::Zeroizing;

use super::{STTError, STTResult, Transcriber, require_key};
use crate::core::http::{describe_failure, is_auth_failure, join_url};

pub const DEEPGRAM_DEFAULT_MODEL: &str = "nova-2";

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListenResponse {
    #[serde(default)]
    pub results: Option<ListenResults>,
}

#[derive(Debug, Deserialize)]
pub struct ListenResults {
    #[serde(default)]
    pub channels: Vec<ListenChannel>,
}

#[derive(Debug, Deserialize)]
pub struct ListenChannel {
    #[serde(default)]
    pub alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
pub struct ListenAlternative {
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub confidence: f32,
}

impl ListenResponse {
    /// Best transcript of the first channel, empty when there is none.
    pub fn best_transcript(self) -> String {
        self.results
            .and_then(|r| r.channels.into_iter().next())
            .and_then(|c| c.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .unwrap_or_default()
    }
}

// =============================================================================
// Client
// =============================================================================

pub struct DeepgramSTT {
    http: Client,
    endpoint: String,
    api_key: Zeroizing<String>,
    model: String,
}

impl DeepgramSTT {
    pub fn new(http: Client, base_url: &str, api_key: &str) -> STTResult<Self> {
        require_key(api_key, "Deepgram")?;
        Ok(Self {
            http,
            endpoint: join_url(base_url, "v1/listen"),
            api_key: Zeroizing::new(api_key.to_string()),
            model: DEEPGRAM_DEFAULT_MODEL.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl Transcriber for DeepgramSTT {
    async fn transcribe(&self, wav: Bytes, language: &str) -> STTResult<String> {
        if wav.is_empty() {
            return Ok(String::new());
        }

        let mut query = vec![
            ("model", self.model.as_str()),
            ("smart_format", "true"),
        ];
        if !language.is_empty() {
            query.push(("language", language));
        }

        let response = self
            .http
            .post(&self.endpoint)
            .query(&query)
            .header("Authorization", format!("Token {}", self.api_key.as_str()))
            .header("Content-Type", "audio/wav")
            .body(wav)
            .send()
            .await
            .map_err(|e| STTError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| STTError::NetworkError(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = describe_failure("Deepgram", status, &body);
            return Err(if is_auth_failure(status) {
                STTError::AuthenticationFailed(message)
            } else {
                STTError::ProviderError(message)
            });
        }

        let parsed: ListenResponse = serde_json::from_str(&body)
            .map_err(|e| STTError::InvalidResponse(format!("Failed to parse response: {e}")))?;
        let transcript = parsed.best_transcript();
        debug!(chars = transcript.len(), "Deepgram transcription complete");
        Ok(transcript)
    }

    fn provider_name(&self) -> &'static str {
        "deepgram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_transcript() {
        let json = r#"{
            "metadata": {"request_id": "r1"},
            "results": {"channels": [
                {"alternatives": [
                    {"transcript": "hello there", "confidence": 0.98},
                    {"transcript": "hello bear", "confidence": 0.4}
                ]}
            ]}
        }"#;
        let response: ListenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.best_transcript(), "hello there");
    }

    #[test]
    fn test_missing_alternatives_is_empty() {
        let response: ListenResponse =
            serde_json::from_str(r#"{"results": {"channels": [{"alternatives": []}]}}"#).unwrap();
        assert_eq!(response.best_transcript(), "");

        let response: ListenResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.best_transcript(), "");
    }

    #[test]
    fn test_new_requires_key() {
        assert!(DeepgramSTT::new(Client::new(), "https://api.deepgram.com", "").is_err());
        let stt = DeepgramSTT::new(Client::new(), "https://api.deepgram.com/", "dg").unwrap();
        assert_eq!(stt.endpoint, "https://api.deepgram.com/v1/listen");
        assert_eq!(stt.model, "nova-2");
    }

    #[tokio::test]
    async fn test_empty_audio_short_circuits() {
        // Unroutable base URL: any request would fail.
        let stt = DeepgramSTT::new(Client::new(), "http://127.0.0.1:1", "dg").unwrap();
        assert_eq!(stt.transcribe(Bytes::new(), "en").await.unwrap(), "");
    }
}
