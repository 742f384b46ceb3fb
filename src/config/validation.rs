use std::path::Path;

use super::{MAX_CREDENTIAL_CACHE_TTL_SECONDS, ServerConfig, TlsConfig};

const SUPPORTED_JWT_ALGORITHMS: [&str; 3] = ["HS256", "HS384", "HS512"];

/// TLS files must exist when TLS is configured.
pub fn validate_tls(tls: &Option<TlsConfig>) -> Result<(), String> {
    if let Some(tls) = tls {
        for (label, path) in [("certificate", &tls.cert_path), ("key", &tls.key_path)] {
            if !path.exists() {
                return Err(format!(
                    "TLS {label} file not found: {}",
                    path.display()
                ));
            }
        }
    }
    Ok(())
}

/// A JWT secret is required when authentication is enforced.
pub fn validate_auth(auth_required: bool, jwt_secret: &Option<String>) -> Result<(), String> {
    if auth_required && jwt_secret.as_deref().is_none_or(|s| s.trim().is_empty()) {
        return Err(
            "AUTH_REQUIRED is enabled but JWT_SECRET is not set. Set JWT_SECRET or disable AUTH_REQUIRED."
                .to_string(),
        );
    }
    Ok(())
}

pub fn validate_jwt_algorithm(algorithm: &str) -> Result<(), String> {
    if SUPPORTED_JWT_ALGORITHMS.contains(&algorithm.to_uppercase().as_str()) {
        Ok(())
    } else {
        Err(format!(
            "Unsupported JWT_ALGORITHM '{algorithm}'. Supported: {}",
            SUPPORTED_JWT_ALGORITHMS.join(", ")
        ))
    }
}

/// The directory file must be configured and readable.
pub fn validate_directory(path: Option<&Path>) -> Result<(), String> {
    match path {
        None => Err("DIRECTORY_PATH is required".to_string()),
        Some(path) if !path.is_file() => {
            Err(format!("Directory file not found: {}", path.display()))
        }
        Some(_) => Ok(()),
    }
}

pub fn validate_cache_ttl(ttl_seconds: u64) -> Result<(), String> {
    if ttl_seconds > MAX_CREDENTIAL_CACHE_TTL_SECONDS {
        return Err(format!(
            "CREDENTIAL_CACHE_TTL_SECONDS must be at most {MAX_CREDENTIAL_CACHE_TTL_SECONDS}, got {ttl_seconds}"
        ));
    }
    Ok(())
}

pub fn validate_timeouts(config: &ServerConfig) -> Result<(), String> {
    let timeouts = [
        ("STT_TIMEOUT_SECONDS", config.stt_timeout_seconds),
        ("RETRIEVAL_TIMEOUT_SECONDS", config.retrieval_timeout_seconds),
        ("LLM_TIMEOUT_SECONDS", config.llm_timeout_seconds),
        ("TTS_TIMEOUT_SECONDS", config.tts_timeout_seconds),
    ];
    for (name, value) in timeouts {
        if value == 0 {
            return Err(format!("{name} must be greater than zero"));
        }
    }
    Ok(())
}

pub fn validate_endpoints(config: &ServerConfig) -> Result<(), String> {
    let endpoints = &config.provider_endpoints;
    let urls = [
        ("openai_base_url", endpoints.openai.as_str()),
        ("deepgram_base_url", endpoints.deepgram.as_str()),
        ("anthropic_base_url", endpoints.anthropic.as_str()),
        ("groq_base_url", endpoints.groq.as_str()),
        ("deepseek_base_url", endpoints.deepseek.as_str()),
        ("google_base_url", endpoints.google.as_str()),
        ("qdrant_url", config.qdrant_url.as_str()),
    ];
    for (name, raw) in urls {
        let url = url::Url::parse(raw).map_err(|e| format!("Invalid {name} '{raw}': {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("Invalid {name} '{raw}': scheme must be http or https"));
        }
    }
    Ok(())
}

/// Run every check on a merged configuration.
pub fn validate_all(config: &ServerConfig) -> Result<(), String> {
    validate_tls(&config.tls)?;
    validate_auth(config.auth_required, &config.jwt_secret)?;
    validate_jwt_algorithm(&config.jwt_algorithm)?;
    validate_directory(config.directory_path.as_deref())?;
    validate_cache_ttl(config.credential_cache_ttl_seconds)?;
    validate_timeouts(config)?;
    validate_endpoints(config)?;
    Ok(())
}
