use std::path::PathBuf;

use super::env::load_from_env;
use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig};

/// Apply YAML overrides on top of the environment configuration.
pub fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = load_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            match tls.enabled {
                Some(false) => config.tls = None,
                _ => {
                    if let (Some(cert), Some(key)) = (tls.cert_path, tls.key_path) {
                        config.tls = Some(TlsConfig {
                            cert_path: PathBuf::from(cert),
                            key_path: PathBuf::from(key),
                        });
                    } else if tls.enabled == Some(true) && config.tls.is_none() {
                        return Err(
                            "server.tls.enabled requires both cert_path and key_path".into()
                        );
                    }
                }
            }
        }
    }

    if let Some(auth) = yaml.auth {
        if let Some(required) = auth.required {
            config.auth_required = required;
        }
        if let Some(secret) = auth.jwt_secret {
            config.jwt_secret = Some(secret);
        }
        if let Some(algorithm) = auth.jwt_algorithm {
            config.jwt_algorithm = algorithm;
        }
    }

    if let Some(directory) = yaml.directory {
        if let Some(path) = directory.path {
            config.directory_path = Some(PathBuf::from(path));
        }
        if let Some(ttl) = directory.credential_cache_ttl_seconds {
            config.credential_cache_ttl_seconds = ttl;
        }
    }

    if let Some(providers) = yaml.providers {
        if let Some(key) = providers.openai_api_key {
            config.openai_api_key = Some(key);
        }
        let endpoints = &mut config.provider_endpoints;
        let overrides = [
            (providers.openai_base_url, &mut endpoints.openai),
            (providers.deepgram_base_url, &mut endpoints.deepgram),
            (providers.anthropic_base_url, &mut endpoints.anthropic),
            (providers.groq_base_url, &mut endpoints.groq),
            (providers.deepseek_base_url, &mut endpoints.deepseek),
            (providers.google_base_url, &mut endpoints.google),
        ];
        for (value, target) in overrides {
            if let Some(url) = value {
                *target = url;
            }
        }
    }

    if let Some(knowledge) = yaml.knowledge {
        if let Some(url) = knowledge.qdrant_url {
            config.qdrant_url = url;
        }
        if let Some(key) = knowledge.qdrant_api_key {
            config.qdrant_api_key = Some(key);
        }
    }

    if let Some(pipeline) = yaml.pipeline {
        if let Some(seconds) = pipeline.stt_timeout_seconds {
            config.stt_timeout_seconds = seconds;
        }
        if let Some(seconds) = pipeline.retrieval_timeout_seconds {
            config.retrieval_timeout_seconds = seconds;
        }
        if let Some(seconds) = pipeline.llm_timeout_seconds {
            config.llm_timeout_seconds = seconds;
        }
        if let Some(seconds) = pipeline.tts_timeout_seconds {
            config.tts_timeout_seconds = seconds;
        }
    }

    if let Some(security) = yaml.security {
        if let Some(origins) = security.cors_allowed_origins {
            config.cors_allowed_origins = Some(origins);
        }
        if let Some(rps) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
        if let Some(max) = security.max_websocket_connections {
            config.max_websocket_connections = Some(max);
        }
        if let Some(max) = security.max_connections_per_ip {
            config.max_connections_per_ip = max;
        }
    }

    Ok(config)
}
