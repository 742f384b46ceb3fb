use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::core::directory::DirectoryError;

pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced by the HTTP layer and application startup.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    TooManyRequests(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ServiceUnavailable(_) | AppError::Directory(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Config(_) | AppError::HttpClient(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(serde_json::json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_too_many_requests_response() {
        let response =
            AppError::TooManyRequests("Too many connections from your IP address.".into())
                .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Too many connections from your IP address.");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::ServiceUnavailable("busy".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Config("bad".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
