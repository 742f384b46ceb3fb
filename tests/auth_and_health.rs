//! Router Tests
//!
//! Exercises the assembled router in-process: the public health check and
//! the authentication layer in front of the voice endpoint.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode, get_current_timestamp};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use voxa_gateway::core::directory::FileDirectory;
use voxa_gateway::{ServerConfig, routes, state::AppState};

use common::{DIRECTORY_YAML, ScriptedFactory};

const SECRET: &str = "integration-test-secret";

fn secured_app() -> axum::Router {
    let mut config = ServerConfig::default();
    config.auth_required = true;
    config.jwt_secret = Some(SECRET.to_string());
    let directory = Arc::new(FileDirectory::from_yaml_str(DIRECTORY_YAML).unwrap());
    let state = AppState::with_components(
        config,
        directory,
        Arc::new(ScriptedFactory::new(vec![], 10)),
    )
    .unwrap();
    routes::build_router(state)
}

fn request(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let mut request = builder.body(Body::empty()).unwrap();
    let addr: SocketAddr = "192.0.2.10:50000".parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

fn token(secret: &str, exp_offset: i64) -> String {
    let exp = get_current_timestamp() as i64 + exp_offset;
    encode(
        &Header::default(),
        &json!({"sub": "anonymous", "exp": exp}),
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_check_is_public() {
    let response = secured_app().oneshot(request("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "OK"}));
}

#[tokio::test]
async fn test_voice_requires_token() {
    let response = secured_app()
        .oneshot(request("/voice/front-desk", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn test_voice_rejects_foreign_signature() {
    let forged = token("some-other-secret", 600);
    let response = secured_app()
        .oneshot(request("/voice/front-desk", Some(&forged)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_voice_rejects_expired_token() {
    let expired = token(SECRET, -3600);
    let response = secured_app()
        .oneshot(request("/voice/front-desk", Some(&expired)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_token_passes_auth() {
    let valid = token(SECRET, 600);
    let response = secured_app()
        .oneshot(request("/voice/front-desk", Some(&valid)))
        .await
        .unwrap();
    // Past authentication; a plain GET is not a WebSocket handshake.
    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_query_token_accepted() {
    let valid = token(SECRET, 600);
    let uri = format!("/voice/front-desk?token={valid}");
    let response = secured_app().oneshot(request(&uri, None)).await.unwrap();
    assert_ne!(response.status(), StatusCode::UNAUTHORIZED);
}

#[test]
fn test_auth_without_secret_refused() {
    let mut config = ServerConfig::default();
    config.auth_required = true;
    config.jwt_secret = None;
    let directory = Arc::new(FileDirectory::from_yaml_str(DIRECTORY_YAML).unwrap());
    let result = AppState::with_components(
        config,
        directory,
        Arc::new(ScriptedFactory::new(vec![], 10)),
    );
    assert!(result.is_err());
}
