use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present
/// here override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   tls:
///     enabled: true
///     cert_path: "/etc/voxa/cert.pem"
///     key_path: "/etc/voxa/key.pem"
///
/// auth:
///   required: true
///   jwt_secret: "change-me"
///   jwt_algorithm: "HS256"
///
/// directory:
///   path: "/etc/voxa/directory.yaml"
///   credential_cache_ttl_seconds: 60
///
/// providers:
///   openai_api_key: "sk-platform-key"
///   deepgram_base_url: "https://api.deepgram.com"
///
/// knowledge:
///   qdrant_url: "http://localhost:6333"
///   qdrant_api_key: "qdrant-key"
///
/// pipeline:
///   stt_timeout_seconds: 15
///   retrieval_timeout_seconds: 10
///   llm_timeout_seconds: 20
///   tts_timeout_seconds: 30
///
/// security:
///   cors_allowed_origins: "https://app.example.com"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
///   max_websocket_connections: 500
///   max_connections_per_ip: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub auth: Option<AuthYaml>,
    pub directory: Option<DirectoryYaml>,
    pub providers: Option<ProvidersYaml>,
    pub knowledge: Option<KnowledgeYaml>,
    pub pipeline: Option<PipelineYaml>,
    pub security: Option<SecurityYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AuthYaml {
    pub required: Option<bool>,
    pub jwt_secret: Option<String>,
    pub jwt_algorithm: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DirectoryYaml {
    pub path: Option<String>,
    pub credential_cache_ttl_seconds: Option<u64>,
}

/// Provider endpoints and the platform OpenAI key
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    /// Platform key used for query embeddings only
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub deepgram_base_url: Option<String>,
    pub anthropic_base_url: Option<String>,
    pub groq_base_url: Option<String>,
    pub deepseek_base_url: Option<String>,
    pub google_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct KnowledgeYaml {
    pub qdrant_url: Option<String>,
    pub qdrant_api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PipelineYaml {
    pub stt_timeout_seconds: Option<u64>,
    pub retrieval_timeout_seconds: Option<u64>,
    pub llm_timeout_seconds: Option<u64>,
    pub tts_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: Option<u32>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;
        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file {}: {e}", path.display()))?;
        Ok(config)
    }
}
