//! Voice WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::voice::voice_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the voice WebSocket router
///
/// # Endpoint
///
/// `GET /voice/{agent_id}` - WebSocket upgrade for one call with the agent
///
/// # Authentication
///
/// Browsers cannot set headers on a WebSocket, so the bearer token may also
/// be passed as `?token=<jwt>`.
///
/// # Example
///
/// ```json
/// // Server announces the session
/// {"type": "ready", "agent": "Front Desk"}
///
/// // Client streams PCM as binary frames, then
/// {"type": "end_turn"}
///
/// // Server replies
/// {"type": "transcript", "role": "user", "text": "What are your hours?"}
/// {"type": "transcript", "role": "assistant", "text": "We open at nine."}
/// // binary audio frames
/// {"type": "audio_end"}
/// ```
pub fn create_voice_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/voice/{agent_id}", get(voice_handler))
        .layer(TraceLayer::new_for_http())
}
