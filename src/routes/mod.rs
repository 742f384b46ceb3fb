pub mod api;
pub mod voice;

use axum::{Router, middleware};
use std::sync::Arc;

use crate::middleware::{auth_middleware, connection_limit_middleware};
use crate::state::AppState;

/// Assemble the application routes with their middleware.
///
/// Layer order on the voice routes (outer to inner):
/// connection_limit -> auth -> handler. The router must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let voice_routes = voice::create_voice_router()
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            connection_limit_middleware,
        ));

    api::create_public_router()
        .merge(voice_routes)
        .with_state(state)
}
