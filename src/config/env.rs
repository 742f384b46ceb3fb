use std::path::PathBuf;

use super::utils::{env_bool, env_parse, env_parse_opt, env_var};
use super::{
    DEFAULT_CREDENTIAL_CACHE_TTL_SECONDS, DEFAULT_JWT_ALGORITHM, DEFAULT_QDRANT_URL, ServerConfig,
    TlsConfig,
};
use crate::core::pipeline::PipelineTimeouts;
use crate::core::providers::ProviderEndpoints;

/// Build a configuration from environment variables and defaults.
pub fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let defaults = PipelineTimeouts::default();
    let endpoints = ProviderEndpoints::default();

    let tls = match (env_var("TLS_CERT_PATH"), env_var("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => {
            return Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".into());
        }
    };

    Ok(ServerConfig {
        host: env_var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
        port: env_parse("PORT", 3001u16)?,
        tls,

        auth_required: env_bool("AUTH_REQUIRED", true)?,
        jwt_secret: env_var("JWT_SECRET"),
        jwt_algorithm: env_var("JWT_ALGORITHM").unwrap_or_else(|| DEFAULT_JWT_ALGORITHM.into()),

        directory_path: env_var("DIRECTORY_PATH").map(PathBuf::from),
        credential_cache_ttl_seconds: env_parse(
            "CREDENTIAL_CACHE_TTL_SECONDS",
            DEFAULT_CREDENTIAL_CACHE_TTL_SECONDS,
        )?,

        provider_endpoints: ProviderEndpoints {
            openai: env_var("OPENAI_BASE_URL").unwrap_or(endpoints.openai),
            deepgram: env_var("DEEPGRAM_BASE_URL").unwrap_or(endpoints.deepgram),
            anthropic: env_var("ANTHROPIC_BASE_URL").unwrap_or(endpoints.anthropic),
            groq: env_var("GROQ_BASE_URL").unwrap_or(endpoints.groq),
            deepseek: env_var("DEEPSEEK_BASE_URL").unwrap_or(endpoints.deepseek),
            google: env_var("GOOGLE_BASE_URL").unwrap_or(endpoints.google),
        },
        openai_api_key: env_var("OPENAI_API_KEY"),
        qdrant_url: env_var("QDRANT_URL").unwrap_or_else(|| DEFAULT_QDRANT_URL.to_string()),
        qdrant_api_key: env_var("QDRANT_API_KEY"),

        stt_timeout_seconds: env_parse(
            "STT_TIMEOUT_SECONDS",
            defaults.transcription.as_secs(),
        )?,
        retrieval_timeout_seconds: env_parse(
            "RETRIEVAL_TIMEOUT_SECONDS",
            defaults.retrieval.as_secs(),
        )?,
        llm_timeout_seconds: env_parse("LLM_TIMEOUT_SECONDS", defaults.generation.as_secs())?,
        tts_timeout_seconds: env_parse("TTS_TIMEOUT_SECONDS", defaults.synthesis.as_secs())?,

        cors_allowed_origins: env_var("CORS_ALLOWED_ORIGINS"),
        rate_limit_requests_per_second: env_parse("RATE_LIMIT_REQUESTS_PER_SECOND", 60u32)?,
        rate_limit_burst_size: env_parse("RATE_LIMIT_BURST_SIZE", 10u32)?,
        max_websocket_connections: env_parse_opt("MAX_WEBSOCKET_CONNECTIONS")?,
        max_connections_per_ip: env_parse("MAX_CONNECTIONS_PER_IP", 100u32)?,
    })
}
