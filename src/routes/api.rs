use axum::{Router, routing::get};

use crate::handlers::api;
use crate::state::AppState;
use std::sync::Arc;

/// Public routes, served without authentication
pub fn create_public_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(api::health_check))
}
