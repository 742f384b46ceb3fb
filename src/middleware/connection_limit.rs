//! Connection limit middleware for WebSocket connections
//!
//! Enforces the global maximum of concurrent WebSocket sessions and the
//! per-IP maximum.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use voxa_gateway::middleware::connection_limit_middleware;
//!
//! let app = Router::new()
//!     .route("/voice/{agent_id}", get(voice_handler))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         connection_limit_middleware,
//!     ));
//! ```

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::errors::app_error::AppError;
use crate::state::{AppState, ConnectionSlot};

/// Middleware that enforces connection limits for WebSocket connections.
///
/// Returns 503 when the global limit is reached and 429 when the caller's IP
/// is at its limit. On success the acquired [`ConnectionSlot`] is inserted as
/// an `Arc<ConnectionSlot>` extension; the handler keeps it for the lifetime
/// of the session and the slot is released when the last reference drops.
///
/// Only WebSocket upgrade requests (detected by the Upgrade header) are
/// counted. Other requests pass through.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let is_ws_upgrade = request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);

    if !is_ws_upgrade {
        return next.run(request).await;
    }

    let client_ip = addr.ip();

    match state.try_acquire_connection(client_ip) {
        Ok(slot) => {
            request.extensions_mut().insert(Arc::new(slot));
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(
                ip = %client_ip,
                reason = %e,
                active = state.ws_connection_count(),
                "Rejecting WebSocket connection"
            );
            AppError::from(e).into_response()
        }
    }
}

/// Type carried in request extensions by [`connection_limit_middleware`].
pub type HeldConnection = Arc<ConnectionSlot>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::core::credentials::ProviderCredentials;
    use crate::core::directory::{AgentProfile, FileDirectory};
    use crate::core::providers::{CapabilityError, CapabilityFactory, SessionCapabilities};
    use axum::{Extension, Router, http::StatusCode, routing::get};
    use std::net::{IpAddr, Ipv4Addr};
    use tower::ServiceExt;

    struct NoCapabilities;

    impl CapabilityFactory for NoCapabilities {
        fn build(
            &self,
            agent: &AgentProfile,
            _credentials: &ProviderCredentials,
        ) -> Result<SessionCapabilities, CapabilityError> {
            Err(CapabilityError::UnsupportedChatProvider(agent.llm_provider))
        }
    }

    fn app(max_per_ip: u32) -> (Arc<AppState>, Router) {
        let mut config = ServerConfig::default();
        config.auth_required = false;
        config.max_connections_per_ip = max_per_ip;
        let directory = Arc::new(FileDirectory::from_yaml_str("organizations: []").unwrap());
        let state =
            AppState::with_components(config, directory, Arc::new(NoCapabilities)).unwrap();

        let router = Router::new()
            .route(
                "/ws",
                get(|slot: Option<Extension<HeldConnection>>| async move {
                    if slot.is_some() { "held" } else { "free" }
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                connection_limit_middleware,
            ))
            .with_state(state.clone());
        (state, router)
    }

    fn request(upgrade: bool) -> Request<Body> {
        let mut builder = Request::builder().uri("/ws");
        if upgrade {
            builder = builder.header("upgrade", "websocket");
        }
        let mut request = builder.body(Body::empty()).unwrap();
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)), 40000);
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    }

    #[tokio::test]
    async fn test_plain_requests_not_counted() {
        let (state, router) = app(1);
        let response = router.oneshot(request(false)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.ws_connection_count(), 0);
    }

    #[tokio::test]
    async fn test_upgrade_slot_released_after_response() {
        let (state, router) = app(1);
        let response = router.oneshot(request(true)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        // The handler did not keep the slot, so it is already released.
        assert_eq!(state.ws_connection_count(), 0);
    }

    #[tokio::test]
    async fn test_per_ip_limit_rejects() {
        let (state, router) = app(1);
        let ip: IpAddr = Ipv4Addr::new(10, 0, 0, 7).into();
        let _held = state.try_acquire_connection(ip).unwrap();

        let response = router.oneshot(request(true)).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(state.ws_connection_count(), 1);
    }
}
