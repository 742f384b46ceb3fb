//! Read-only view of users, organizations, agents and provider keys.
//!
//! A voice session resolves everything it needs through the [`Directory`]
//! trait before it accepts audio: the caller's organization, the agent
//! profile (scoped to that organization), the organization's provider keys
//! and the agent's knowledge collection.

mod cache;
mod file;

pub use cache::CachedDirectory;
pub use file::FileDirectory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::core::credentials::{ProviderCredentials, ProviderId};

#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The backing store could not be read.
    #[error("Directory unavailable: {0}")]
    Unavailable(String),

    /// The backing store holds data that violates the directory model.
    #[error("Invalid directory data: {0}")]
    Invalid(String),
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const DEFAULT_GREETING: &str = "Hello! How can I help you today?";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TTS_VOICE: &str = "aura-asteria-en";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_MAX_CALL_DURATION_SECONDS: u64 = 600;

/// Configuration of a voice agent as stored in the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    pub name: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_llm_provider")]
    pub llm_provider: ProviderId,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,
    /// Provider used for both transcription and synthesis
    #[serde(default = "default_speech_provider")]
    pub speech_provider: ProviderId,
    #[serde(default = "default_tts_voice")]
    pub tts_voice: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_max_call_duration")]
    pub max_call_duration_seconds: u64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}

fn default_llm_provider() -> ProviderId {
    ProviderId::OpenAI
}

fn default_llm_model() -> String {
    DEFAULT_LLM_MODEL.to_string()
}

fn default_speech_provider() -> ProviderId {
    ProviderId::Deepgram
}

fn default_tts_voice() -> String {
    DEFAULT_TTS_VOICE.to_string()
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_max_call_duration() -> u64 {
    DEFAULT_MAX_CALL_DURATION_SECONDS
}

fn default_true() -> bool {
    true
}

impl AgentProfile {
    /// Profile with every optional field at its default.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            system_prompt: default_system_prompt(),
            greeting: default_greeting(),
            llm_provider: default_llm_provider(),
            llm_model: default_llm_model(),
            speech_provider: default_speech_provider(),
            tts_voice: default_tts_voice(),
            language: default_language(),
            max_call_duration_seconds: default_max_call_duration(),
            is_active: true,
        }
    }

    pub fn max_call_duration(&self) -> Duration {
        Duration::from_secs(self.max_call_duration_seconds)
    }

    /// Providers whose keys the session needs, without duplicates.
    pub fn required_providers(&self) -> Vec<ProviderId> {
        let mut providers = vec![self.llm_provider];
        if self.speech_provider != self.llm_provider {
            providers.push(self.speech_provider);
        }
        providers
    }
}

/// Name of the vector collection backing a knowledge base.
pub fn collection_name(knowledge_base_id: &str) -> String {
    format!("kb_{knowledge_base_id}")
}

#[async_trait]
pub trait Directory: Send + Sync {
    /// Organization the user belongs to, if any.
    async fn organization_for_user(&self, user_id: &str) -> DirectoryResult<Option<String>>;

    /// Agent with the given id, only if it belongs to `org_id`.
    async fn agent(&self, org_id: &str, agent_id: &str) -> DirectoryResult<Option<AgentProfile>>;

    /// Active API key of the organization for `provider`.
    async fn provider_key(
        &self,
        org_id: &str,
        provider: ProviderId,
    ) -> DirectoryResult<Option<String>>;

    /// Vector collection of the agent's first knowledge base.
    async fn knowledge_collection(&self, agent_id: &str) -> DirectoryResult<Option<String>>;
}

/// Resolve every known provider key of an organization.
pub async fn resolve_credentials(
    directory: &dyn Directory,
    org_id: &str,
) -> DirectoryResult<ProviderCredentials> {
    let mut credentials = ProviderCredentials::new();
    for provider in ProviderId::ALL {
        if let Some(key) = directory.provider_key(org_id, provider).await? {
            credentials.insert(provider, key);
        }
    }
    Ok(credentials)
}
