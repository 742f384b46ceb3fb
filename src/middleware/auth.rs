use crate::auth::Auth;
use crate::errors::auth_error::AuthError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Extract authentication token from request
///
/// Supports two token sources for browser/WebSocket compatibility:
/// 1. Authorization header: `Authorization: Bearer <token>` (preferred)
/// 2. Query parameter: `?token=<token>` (browsers cannot set headers on a WebSocket)
fn extract_token(request: &Request) -> Result<String, AuthError> {
    // Try Authorization header first (preferred method)
    if let Some(auth_header) = request.headers().get("authorization") {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            tracing::debug!("Token extracted from Authorization header");
            return Ok(token.trim().to_string());
        }
        return Err(AuthError::InvalidAuthHeader);
    }

    if let Some(query) = request.uri().query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if key == "token" && !value.is_empty() {
                tracing::debug!("Token extracted from query parameter");
                return Ok(value.into_owned());
            }
        }
    }

    Err(AuthError::MissingAuthHeader)
}

/// Authentication middleware that validates bearer JWTs
///
/// On success the token's subject is inserted as an [`Auth`] extension.
/// Failures are rejected with 401 before the handler runs, so an
/// unauthenticated WebSocket is never upgraded.
///
/// When authentication is disabled an empty [`Auth`] is inserted instead.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    // Still insert an empty Auth so handlers that need Auth context work
    if !state.config.auth_required {
        tracing::debug!("Authentication disabled, inserting empty Auth context");
        request.extensions_mut().insert(Auth::empty());
        return Ok(next.run(request).await);
    }

    let request_method = request.method().to_string();
    let request_path = request.uri().path().to_string();

    let verifier = state
        .jwt
        .as_ref()
        .ok_or_else(|| AuthError::ConfigError("JWT verifier not initialized".to_string()))?;

    let token = extract_token(&request).inspect_err(|e| {
        tracing::warn!(
            method = %request_method,
            path = %request_path,
            error = %e,
            "Rejecting request without usable token"
        );
    })?;

    match verifier.verify(&token) {
        Ok(claims) => {
            tracing::info!(
                method = %request_method,
                path = %request_path,
                auth_id = %claims.sub,
                "JWT authentication successful"
            );
            request.extensions_mut().insert(Auth::new(claims.sub));
            Ok(next.run(request).await)
        }
        Err(e) => {
            tracing::warn!(
                method = %request_method,
                path = %request_path,
                error = %e,
                "JWT authentication failed"
            );
            Err(e)
        }
    }
}
