//! Configuration module for the Voxa gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use voxa_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

use crate::core::pipeline::PipelineTimeouts;
use crate::core::providers::ProviderEndpoints;

pub const DEFAULT_JWT_ALGORITHM: &str = "HS256";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
pub const DEFAULT_CREDENTIAL_CACHE_TTL_SECONDS: u64 = 60;
pub const MAX_CREDENTIAL_CACHE_TTL_SECONDS: u64 = 3600;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains everything needed to run the gateway:
/// - Server settings (host, port, TLS)
/// - Authentication (JWT verification)
/// - Directory location and credential cache lifetime
/// - Provider endpoints, the platform embedding key and the vector store
/// - Per-stage pipeline timeouts
/// - Security settings (CORS, rate limiting, connection limits)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Authentication
    pub auth_required: bool,
    /// HMAC secret used to verify bearer JWTs
    pub jwt_secret: Option<String>,
    /// HS256, HS384 or HS512
    pub jwt_algorithm: String,

    // Directory
    /// YAML file with organizations, users, agents and provider keys
    pub directory_path: Option<PathBuf>,
    /// Lifetime of cached provider keys; 0 disables the cache
    pub credential_cache_ttl_seconds: u64,

    // Providers
    pub provider_endpoints: ProviderEndpoints,
    /// Platform OpenAI key for query embeddings; sessions use organization keys
    pub openai_api_key: Option<String>,
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,

    // Pipeline timeouts
    pub stt_timeout_seconds: u64,
    pub retrieval_timeout_seconds: u64,
    pub llm_timeout_seconds: u64,
    pub tts_timeout_seconds: u64,

    // Security settings
    /// Comma-separated list of allowed origins, or "*" for any
    pub cors_allowed_origins: Option<String>,
    pub rate_limit_requests_per_second: u32,
    pub rate_limit_burst_size: u32,
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let timeouts = PipelineTimeouts::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            tls: None,
            auth_required: true,
            jwt_secret: None,
            jwt_algorithm: DEFAULT_JWT_ALGORITHM.to_string(),
            directory_path: None,
            credential_cache_ttl_seconds: DEFAULT_CREDENTIAL_CACHE_TTL_SECONDS,
            provider_endpoints: ProviderEndpoints::default(),
            openai_api_key: None,
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            qdrant_api_key: None,
            stt_timeout_seconds: timeouts.transcription.as_secs(),
            retrieval_timeout_seconds: timeouts.retrieval.as_secs(),
            llm_timeout_seconds: timeouts.generation.as_secs(),
            tts_timeout_seconds: timeouts.synthesis.as_secs(),
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_websocket_connections: None,
            max_connections_per_ip: 100,
        }
    }
}

/// Zeroize secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut secret) = self.jwt_secret {
            secret.zeroize();
        }
        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.qdrant_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables (and defaults), then validate.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate_all(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // .env is loaded in main.rs before this runs
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate_all(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Stage timeouts handed to every session pipeline.
    pub fn pipeline_timeouts(&self) -> PipelineTimeouts {
        PipelineTimeouts {
            transcription: Duration::from_secs(self.stt_timeout_seconds),
            retrieval: Duration::from_secs(self.retrieval_timeout_seconds),
            generation: Duration::from_secs(self.llm_timeout_seconds),
            synthesis: Duration::from_secs(self.tts_timeout_seconds),
        }
    }

    /// Credential cache lifetime, `None` when caching is disabled.
    pub fn credential_cache_ttl(&self) -> Option<Duration> {
        (self.credential_cache_ttl_seconds > 0)
            .then(|| Duration::from_secs(self.credential_cache_ttl_seconds))
    }
}
