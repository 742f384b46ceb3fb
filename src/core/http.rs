//! Small helpers shared by the REST provider clients.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

/// Longest upstream error body echoed into an error message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// OpenAI-style error envelope, also returned by Groq, DeepSeek and Gemini.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIErrorResponse {
    pub error: OpenAIError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAIError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
}

/// Build the shared HTTP client used for every provider call.
pub fn build_client(connect_timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .pool_max_idle_per_host(8)
        .build()
}

/// Join a base URL and a path without doubling slashes.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// First characters of an upstream error body.
pub fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    out.push_str("...");
    out
}

/// Readable message for a failed provider response.
pub fn describe_failure(provider: &str, status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<OpenAIErrorResponse>(body) {
        Ok(parsed) => format!("{provider} API error ({status}): {}", parsed.error.message),
        Err(_) => format!("{provider} API error ({status}): {}", truncate_body(body)),
    }
}

/// Whether the status means the credential was rejected.
pub fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://api.openai.com/v1/", "/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(join_url("http://h:1", "v1/listen"), "http://h:1/v1/listen");
    }

    #[test]
    fn test_describe_failure_prefers_error_message() {
        let body = r#"{"error":{"message":"Invalid API key","type":"invalid_request_error"}}"#;
        assert_eq!(
            describe_failure("OpenAI", StatusCode::BAD_REQUEST, body),
            "OpenAI API error (400 Bad Request): Invalid API key"
        );
        assert_eq!(
            describe_failure("Deepgram", StatusCode::BAD_GATEWAY, "upstream down"),
            "Deepgram API error (502 Bad Gateway): upstream down"
        );
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(500);
        let truncated = truncate_body(&long);
        assert_eq!(truncated.len(), 203);
        assert!(truncated.ends_with("..."));
    }
}
