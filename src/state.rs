//! Shared application state
//!
//! One `AppState` is built at startup and shared by every connection. It owns
//! the read-only directory, the capability factory that binds per-session
//! credentials into provider clients, and the WebSocket connection counters.

use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::auth::JwtVerifier;
use crate::config::ServerConfig;
use crate::core::directory::{CachedDirectory, Directory, FileDirectory};
use crate::core::http::build_client;
use crate::core::providers::{CapabilityFactory, HttpCapabilityFactory};
use crate::core::rag::{OpenAIEmbedder, QdrantRetriever, Retriever};
use crate::errors::app_error::{AppError, AppResult};

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionLimitError {
    #[error("Server at capacity. Please try again later.")]
    GlobalLimitReached,
    #[error("Too many connections from your IP address.")]
    PerIpLimitReached,
}

impl From<ConnectionLimitError> for AppError {
    fn from(err: ConnectionLimitError) -> Self {
        match err {
            ConnectionLimitError::GlobalLimitReached => AppError::ServiceUnavailable(err.to_string()),
            ConnectionLimitError::PerIpLimitReached => AppError::TooManyRequests(err.to_string()),
        }
    }
}

/// Global and per-IP WebSocket connection counters.
#[derive(Debug)]
struct ConnectionTracker {
    total: AtomicUsize,
    per_ip: DashMap<IpAddr, usize>,
    max_total: Option<usize>,
    max_per_ip: usize,
}

impl ConnectionTracker {
    fn new(max_total: Option<usize>, max_per_ip: usize) -> Self {
        Self {
            total: AtomicUsize::new(0),
            per_ip: DashMap::new(),
            max_total,
            max_per_ip,
        }
    }

    fn try_acquire(self: &Arc<Self>, ip: IpAddr) -> Result<ConnectionSlot, ConnectionLimitError> {
        match self.max_total {
            Some(max) => {
                self.total
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                        (n < max).then_some(n + 1)
                    })
                    .map_err(|_| ConnectionLimitError::GlobalLimitReached)?;
            }
            None => {
                self.total.fetch_add(1, Ordering::AcqRel);
            }
        }

        let mut count = self.per_ip.entry(ip).or_insert(0);
        if *count >= self.max_per_ip {
            drop(count);
            self.per_ip.remove_if(&ip, |_, n| *n == 0);
            self.total.fetch_sub(1, Ordering::AcqRel);
            return Err(ConnectionLimitError::PerIpLimitReached);
        }
        *count += 1;
        drop(count);

        Ok(ConnectionSlot {
            tracker: Arc::clone(self),
            ip,
        })
    }

    fn release(&self, ip: IpAddr) {
        self.total.fetch_sub(1, Ordering::AcqRel);
        if let Some(mut count) = self.per_ip.get_mut(&ip) {
            *count = count.saturating_sub(1);
        }
        self.per_ip.remove_if(&ip, |_, n| *n == 0);
    }
}

/// A held WebSocket connection slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct ConnectionSlot {
    tracker: Arc<ConnectionTracker>,
    ip: IpAddr,
}

impl ConnectionSlot {
    pub fn ip(&self) -> IpAddr {
        self.ip
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.tracker.release(self.ip);
        debug!(ip = %self.ip, "Connection slot released");
    }
}

/// Application state shared by all handlers
pub struct AppState {
    pub config: ServerConfig,
    pub directory: Arc<dyn Directory>,
    pub capabilities: Arc<dyn CapabilityFactory>,
    /// Present whenever authentication is required
    pub jwt: Option<JwtVerifier>,
    connections: Arc<ConnectionTracker>,
}

impl AppState {
    /// Build the production state: file directory, provider clients over one
    /// shared connection pool, and the Qdrant retriever.
    pub async fn new(config: ServerConfig) -> AppResult<Arc<Self>> {
        let path = config
            .directory_path
            .clone()
            .ok_or_else(|| AppError::Config("DIRECTORY_PATH is required".to_string()))?;
        let file_directory: Arc<dyn Directory> = Arc::new(FileDirectory::from_file(&path)?);
        let directory: Arc<dyn Directory> = match config.credential_cache_ttl() {
            Some(ttl) => {
                info!(ttl_seconds = ttl.as_secs(), "Provider key cache enabled");
                Arc::new(CachedDirectory::new(file_directory, ttl))
            }
            None => file_directory,
        };

        let http = build_client(HTTP_CONNECT_TIMEOUT)?;
        let embedder = Arc::new(OpenAIEmbedder::new(
            http.clone(),
            &config.provider_endpoints.openai,
            config.openai_api_key.as_deref(),
        ));
        let retriever: Arc<dyn Retriever> = Arc::new(QdrantRetriever::new(
            http.clone(),
            &config.qdrant_url,
            config.qdrant_api_key.as_deref(),
            embedder,
        ));
        let capabilities = Arc::new(HttpCapabilityFactory::new(
            http,
            config.provider_endpoints.clone(),
            Some(retriever),
        ));

        Self::with_components(config, directory, capabilities)
    }

    /// Assemble state from already-built collaborators.
    pub fn with_components(
        config: ServerConfig,
        directory: Arc<dyn Directory>,
        capabilities: Arc<dyn CapabilityFactory>,
    ) -> AppResult<Arc<Self>> {
        let jwt = if config.auth_required {
            let secret = config.jwt_secret.as_deref().ok_or_else(|| {
                AppError::Config("JWT_SECRET is required when auth is enabled".to_string())
            })?;
            Some(
                JwtVerifier::new(secret, &config.jwt_algorithm)
                    .map_err(|e| AppError::Config(e.to_string()))?,
            )
        } else {
            None
        };

        let connections = Arc::new(ConnectionTracker::new(
            config.max_websocket_connections,
            config.max_connections_per_ip as usize,
        ));

        Ok(Arc::new(Self {
            config,
            directory,
            capabilities,
            jwt,
            connections,
        }))
    }

    /// Reserve a WebSocket slot for `ip`, enforcing the global and per-IP limits.
    pub fn try_acquire_connection(
        &self,
        ip: IpAddr,
    ) -> Result<ConnectionSlot, ConnectionLimitError> {
        self.connections.try_acquire(ip)
    }

    pub fn ws_connection_count(&self) -> usize {
        self.connections.total.load(Ordering::Acquire)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> usize {
        self.connections.per_ip.get(ip).map(|c| *c).unwrap_or(0)
    }
}
