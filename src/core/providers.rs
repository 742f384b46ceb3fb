//! Construction of per-session capabilities.
//!
//! The server owns one [`CapabilityFactory`]. At session setup it receives
//! the agent profile and the organization's resolved keys and returns the
//! four capabilities the pipeline drives. The HTTP client pool, base URLs
//! and the retriever are shared across sessions; only keys are per session.

use reqwest::Client;
use std::sync::Arc;
use thiserror::Error;

use crate::core::credentials::{CredentialError, ProviderCredentials, ProviderId};
use crate::core::directory::AgentProfile;
use crate::core::llm::{AnthropicChat, ChatModel, LLMError, OpenAICompatibleChat};
use crate::core::rag::Retriever;
use crate::core::stt::{DeepgramSTT, OpenAISTT, STTError, Transcriber};
use crate::core::tts::{DeepgramTTS, OpenAITTS, Synthesizer, TTSError};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEEPGRAM_BASE_URL: &str = "https://api.deepgram.com";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Base URL per provider. Overridable so tests and proxies can redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub openai: String,
    pub deepgram: String,
    pub anthropic: String,
    pub groq: String,
    pub deepseek: String,
    pub google: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            openai: OPENAI_BASE_URL.to_string(),
            deepgram: DEEPGRAM_BASE_URL.to_string(),
            anthropic: ANTHROPIC_BASE_URL.to_string(),
            groq: GROQ_BASE_URL.to_string(),
            deepseek: DEEPSEEK_BASE_URL.to_string(),
            google: GOOGLE_BASE_URL.to_string(),
        }
    }
}

impl ProviderEndpoints {
    pub fn base_url(&self, provider: ProviderId) -> &str {
        match provider {
            ProviderId::OpenAI => &self.openai,
            ProviderId::Deepgram => &self.deepgram,
            ProviderId::Anthropic => &self.anthropic,
            ProviderId::Groq => &self.groq,
            ProviderId::DeepSeek => &self.deepseek,
            ProviderId::Google => &self.google,
        }
    }

    /// Point every provider at one base URL.
    pub fn all(base_url: &str) -> Self {
        Self {
            openai: base_url.to_string(),
            deepgram: base_url.to_string(),
            anthropic: base_url.to_string(),
            groq: base_url.to_string(),
            deepseek: base_url.to_string(),
            google: base_url.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("{0} does not offer chat generation")]
    UnsupportedChatProvider(ProviderId),

    #[error("{0} does not offer both transcription and speech synthesis")]
    UnsupportedSpeechProvider(ProviderId),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Transcription(#[from] STTError),

    #[error(transparent)]
    Generation(#[from] LLMError),

    #[error(transparent)]
    Synthesis(#[from] TTSError),
}

/// Capabilities bound to one session's credentials.
#[derive(Clone)]
pub struct SessionCapabilities {
    pub transcriber: Arc<dyn Transcriber>,
    pub chat_model: Arc<dyn ChatModel>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub retriever: Option<Arc<dyn Retriever>>,
}

pub trait CapabilityFactory: Send + Sync {
    fn build(
        &self,
        agent: &AgentProfile,
        credentials: &ProviderCredentials,
    ) -> Result<SessionCapabilities, CapabilityError>;
}

/// Builds REST provider clients over a shared connection pool.
pub struct HttpCapabilityFactory {
    http: Client,
    endpoints: ProviderEndpoints,
    retriever: Option<Arc<dyn Retriever>>,
}

impl HttpCapabilityFactory {
    pub fn new(
        http: Client,
        endpoints: ProviderEndpoints,
        retriever: Option<Arc<dyn Retriever>>,
    ) -> Self {
        Self {
            http,
            endpoints,
            retriever,
        }
    }

    fn chat_model(
        &self,
        agent: &AgentProfile,
        credentials: &ProviderCredentials,
    ) -> Result<Arc<dyn ChatModel>, CapabilityError> {
        let provider = agent.llm_provider;
        let key = credentials.require(provider)?;
        let base_url = self.endpoints.base_url(provider);
        let model: Arc<dyn ChatModel> = match provider {
            ProviderId::Anthropic => Arc::new(AnthropicChat::new(
                self.http.clone(),
                base_url,
                key,
                agent.llm_model.as_str(),
            )?),
            ProviderId::OpenAI | ProviderId::Groq | ProviderId::DeepSeek | ProviderId::Google => {
                Arc::new(OpenAICompatibleChat::new(
                    self.http.clone(),
                    provider,
                    base_url,
                    key,
                    agent.llm_model.as_str(),
                )?)
            }
            ProviderId::Deepgram => return Err(CapabilityError::UnsupportedChatProvider(provider)),
        };
        Ok(model)
    }

    fn speech(
        &self,
        agent: &AgentProfile,
        credentials: &ProviderCredentials,
    ) -> Result<(Arc<dyn Transcriber>, Arc<dyn Synthesizer>), CapabilityError> {
        let provider = agent.speech_provider;
        if !provider.supports_speech() {
            return Err(CapabilityError::UnsupportedSpeechProvider(provider));
        }
        let key = credentials.require(provider)?;
        let base_url = self.endpoints.base_url(provider);
        let pair: (Arc<dyn Transcriber>, Arc<dyn Synthesizer>) = match provider {
            ProviderId::Deepgram => (
                Arc::new(DeepgramSTT::new(self.http.clone(), base_url, key)?),
                Arc::new(DeepgramTTS::new(
                    self.http.clone(),
                    base_url,
                    key,
                    &agent.tts_voice,
                )?),
            ),
            _ => (
                Arc::new(OpenAISTT::new(self.http.clone(), base_url, key)?),
                Arc::new(OpenAITTS::new(
                    self.http.clone(),
                    base_url,
                    key,
                    &agent.tts_voice,
                )?),
            ),
        };
        Ok(pair)
    }
}

impl CapabilityFactory for HttpCapabilityFactory {
    fn build(
        &self,
        agent: &AgentProfile,
        credentials: &ProviderCredentials,
    ) -> Result<SessionCapabilities, CapabilityError> {
        let chat_model = self.chat_model(agent, credentials)?;
        let (transcriber, synthesizer) = self.speech(agent, credentials)?;
        Ok(SessionCapabilities {
            transcriber,
            chat_model,
            synthesizer,
            retriever: self.retriever.clone(),
        })
    }
}
