//! Provider identities and the per-session credential map.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error(
        "Unsupported provider: {0}. Supported providers: openai, deepgram, google, anthropic, groq, deepseek"
    )]
    UnknownProvider(String),

    #[error("No API key configured for {0}. Add it in Settings → API Keys.")]
    MissingCredential(ProviderId),
}

/// Upstream providers an organization can hold API keys for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderId {
    /// OpenAI chat, Whisper transcription, speech and embeddings
    OpenAI,
    /// Deepgram pre-recorded transcription and Aura speech
    Deepgram,
    /// Google Gemini through its OpenAI-compatible endpoint
    Google,
    /// Anthropic Messages API
    Anthropic,
    /// Groq OpenAI-compatible chat completions
    Groq,
    /// DeepSeek OpenAI-compatible chat completions
    DeepSeek,
}

impl ProviderId {
    /// Every provider, in the order keys are resolved at session setup.
    pub const ALL: [ProviderId; 6] = [
        ProviderId::OpenAI,
        ProviderId::Deepgram,
        ProviderId::Google,
        ProviderId::Anthropic,
        ProviderId::Groq,
        ProviderId::DeepSeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "openai",
            ProviderId::Deepgram => "deepgram",
            ProviderId::Google => "google",
            ProviderId::Anthropic => "anthropic",
            ProviderId::Groq => "groq",
            ProviderId::DeepSeek => "deepseek",
        }
    }

    /// Human-readable name used in client-facing messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::OpenAI => "OpenAI",
            ProviderId::Deepgram => "Deepgram",
            ProviderId::Google => "Google",
            ProviderId::Anthropic => "Anthropic",
            ProviderId::Groq => "Groq",
            ProviderId::DeepSeek => "DeepSeek",
        }
    }

    /// Whether the provider can serve chat generation.
    pub fn supports_chat(&self) -> bool {
        !matches!(self, ProviderId::Deepgram)
    }

    /// Whether the provider can serve both transcription and synthesis.
    pub fn supports_speech(&self) -> bool {
        matches!(self, ProviderId::Deepgram | ProviderId::OpenAI)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderId {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderId::OpenAI),
            "deepgram" => Ok(ProviderId::Deepgram),
            "google" | "gemini" => Ok(ProviderId::Google),
            "anthropic" | "claude" => Ok(ProviderId::Anthropic),
            "groq" => Ok(ProviderId::Groq),
            "deepseek" => Ok(ProviderId::DeepSeek),
            _ => Err(CredentialError::UnknownProvider(s.to_string())),
        }
    }
}

impl Serialize for ProviderId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProviderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// API keys resolved for one session, keyed by provider.
///
/// Values are zeroized on drop and never printed by `Debug`.
#[derive(Clone, Default)]
pub struct ProviderCredentials {
    keys: HashMap<ProviderId, Zeroizing<String>>,
}

impl ProviderCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a key. Blank keys are ignored.
    pub fn insert(&mut self, provider: ProviderId, key: impl Into<String>) {
        let key = key.into();
        if key.trim().is_empty() {
            return;
        }
        self.keys.insert(provider, Zeroizing::new(key));
    }

    pub fn get(&self, provider: ProviderId) -> Option<&str> {
        self.keys.get(&provider).map(|k| k.as_str())
    }

    pub fn contains(&self, provider: ProviderId) -> bool {
        self.keys.contains_key(&provider)
    }

    /// Look up a key that the session cannot run without.
    pub fn require(&self, provider: ProviderId) -> Result<&str, CredentialError> {
        self.get(provider)
            .ok_or(CredentialError::MissingCredential(provider))
    }

    /// Providers with a key, sorted.
    pub fn providers(&self) -> Vec<ProviderId> {
        let mut providers: Vec<ProviderId> = self.keys.keys().copied().collect();
        providers.sort();
        providers
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("providers", &self.providers())
            .finish()
    }
}
