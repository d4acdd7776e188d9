use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::api::AppState;
use crate::portero::{
    error::AuthError,
    profile::VerifiedProfile,
    rate_limit::{client_key, Decision},
};

#[derive(ToSchema, Deserialize, Debug)]
pub struct VerifyTokenRequest {
    pub token: String,
    pub refresh_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyTokenResponse {
    pub user: VerifiedProfile,
    pub access_token: String,
    pub expires_at: i64,
    pub token_type: String,
}

#[utoipa::path(
    post,
    path= "/auth/verify-token",
    request_body = VerifyTokenRequest,
    responses (
        (status = 200, description = "Token verified, application session issued", body = VerifyTokenResponse),
        (status = 400, description = "Malformed request or token"),
        (status = 401, description = "Backend rejected the identity token"),
        (status = 429, description = "Too many requests from this client")
    ),
    tag = "auth",
)]
/// Verify an identity token against the auth backend and mint an application
/// session token.
///
/// The rate limit is checked before the body is even parsed, so abusive
/// clients cost no decode work.
#[instrument(skip_all)]
pub async fn verify_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<VerifyTokenRequest>, JsonRejection>,
) -> Result<Json<VerifyTokenResponse>, AuthError> {
    let key = client_key(&headers);
    if let Decision::Limited {
        retry_after_seconds,
    } = state.limiter.check(&key)
    {
        debug!("Rate limited verify-token for {key}");
        return Err(AuthError::RateLimited {
            retry_after_seconds,
        });
    }

    let Json(request) =
        payload.map_err(|_| AuthError::Validation("Invalid JSON".to_string()))?;

    let user = state.backend.get_user(&request.token).await?;

    let profile = VerifiedProfile::from_backend_user(&user)
        .map_err(|err| AuthError::IdentityShape(err.to_string()))?;

    let issued = state
        .signer
        .issue(&profile, Utc::now().timestamp())
        .map_err(|err| AuthError::Internal(anyhow::Error::new(err).context("token signing")))?;

    Ok(Json(VerifyTokenResponse {
        user: profile,
        access_token: issued.token,
        expires_at: issued.expires_at,
        token_type: "Bearer".to_string(),
    }))
}
