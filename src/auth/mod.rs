//! Caller identity for authenticated requests
//!
//! The auth middleware verifies the bearer JWT and inserts an [`Auth`] into
//! the request extensions. Handlers read the caller's user id from it.

use std::str::FromStr;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::errors::auth_error::{AuthError, AuthResult};

/// Authenticated caller context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Auth {
    /// User id taken from the token's `sub` claim; `None` when auth is disabled
    pub id: Option<String>,
}

impl Auth {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
        }
    }

    /// Context used when authentication is disabled.
    pub fn empty() -> Self {
        Self { id: None }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Claims carried by caller tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
}

/// HMAC JWT verifier built once from configuration.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl JwtVerifier {
    pub fn new(secret: &str, algorithm: &str) -> AuthResult<Self> {
        if secret.trim().is_empty() {
            return Err(AuthError::ConfigError("JWT secret is empty".to_string()));
        }
        let algorithm = Algorithm::from_str(&algorithm.to_uppercase())
            .map_err(|_| AuthError::ConfigError(format!("Unsupported algorithm: {algorithm}")))?;
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AuthError::ConfigError(format!(
                "Unsupported algorithm: {algorithm:?}"
            )));
        }

        let mut validation = Validation::new(algorithm);
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Verify signature and expiry, returning the decoded claims.
    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                kind => AuthError::InvalidToken(format!("{kind:?}")),
            }
        })?;

        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken("empty subject".to_string()));
        }
        Ok(data.claims)
    }
}
