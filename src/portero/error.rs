//! Error taxonomy for the sign-in pipeline.
//!
//! Every provider/backend failure is caught at the boundary and converted to
//! one of these variants with a stable machine-readable code; nothing here is
//! allowed to crash a request handler. Unexpected errors collapse into
//! `Internal` and surface as a generic 500 with no internal detail.

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("expected code or credential")]
    MissingCredentials,

    #[error("invalid request: {0}")]
    Validation(String),

    /// The provider rejected the code exchange. Authorization codes are
    /// single-use, so this is never retried.
    #[error("provider rejected the token exchange with status {status}")]
    ProviderExchange {
        status: u16,
        details: serde_json::Value,
    },

    #[error("provider token endpoint timed out")]
    ProviderTimeout,

    #[error("invalid or expired token: {0}")]
    InvalidToken(String),

    #[error("auth backend timed out")]
    BackendTimeout,

    #[error("too many requests")]
    RateLimited { retry_after_seconds: u64 },

    #[error("session signing misconfigured: {0}")]
    SigningConfiguration(String),

    #[error("unrecognized identity record shape: {0}")]
    IdentityShape(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// Stable machine-readable code, used in JSON bodies and error-page
    /// redirects.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing_oauth_params",
            Self::Validation(_) => "invalid_request",
            Self::ProviderExchange { .. } => "google_token_error",
            Self::ProviderTimeout => "provider_timeout",
            Self::InvalidToken(_) => "invalid_token",
            Self::BackendTimeout => "backend_timeout",
            Self::RateLimited { .. } => "rate_limited",
            Self::SigningConfiguration(_) => "signing_configuration",
            Self::IdentityShape(_) => "identity_decode_failed",
            Self::Internal(_) => "internal_error",
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingCredentials | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::ProviderExchange { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::ProviderTimeout | Self::BackendTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::SigningConfiguration(_) | Self::IdentityShape(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Human-readable message safe to put on the wire.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::MissingCredentials => "Expected code or credential".to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::ProviderExchange { .. } => "Token exchange with provider failed".to_string(),
            Self::ProviderTimeout => "Provider token endpoint timed out".to_string(),
            Self::InvalidToken(_) => "Invalid or expired token".to_string(),
            Self::BackendTimeout => "Auth backend timed out".to_string(),
            Self::RateLimited { .. } => "Too many requests".to_string(),
            // Never leak configuration or internal detail to clients.
            Self::SigningConfiguration(_) | Self::IdentityShape(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.kind(),
            "message": self.public_message(),
        });

        // Provider rejections carry the provider's payload so callers can see
        // why the exchange failed (expired code, redirect_uri mismatch).
        if let Self::ProviderExchange { details, .. } = &self {
            body["details"] = details.clone();
        }

        let mut response = (self.status(), Json(body)).into_response();

        if let Self::RateLimited {
            retry_after_seconds,
        } = &self
        {
            if let Ok(value) = HeaderValue::from_str(&retry_after_seconds.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }

        response
    }
}
