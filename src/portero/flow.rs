//! Sign-in completion: turn a fresh backend session into a full browser
//! session, or roll the backend session back if that fails.

use axum::http::HeaderValue;
use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::portero::backend::{BackendClient, BackendSession};
use crate::portero::cookies::session_cookies;
use crate::portero::error::AuthError;
use crate::portero::profile::VerifiedProfile;
use crate::portero::session::SessionSigner;

/// Everything a handler needs to finish a sign-in response.
#[derive(Debug)]
pub struct EstablishedSession {
    pub cookies: Vec<HeaderValue>,
    pub token: String,
    pub expires_at: i64,
    pub profile: VerifiedProfile,
}

/// Complete a sign-in from an already-created backend session.
///
/// The backend session is durable state created before this function runs. If
/// profile mapping, token minting or cookie encoding fails after that point,
/// the backend session is revoked (best effort) so no orphaned session
/// outlives a failed sign-in, and the original error is returned.
///
/// # Errors
/// `IdentityShape` when the backend user's identity list cannot be decoded,
/// `Internal` for signing or encoding failures.
#[instrument(skip_all, fields(subject = %backend_session.user.id))]
pub async fn establish_session(
    backend: &BackendClient,
    signer: &SessionSigner,
    backend_session: &BackendSession,
    secure_cookies: bool,
) -> Result<EstablishedSession, AuthError> {
    match build_session(signer, backend_session, secure_cookies) {
        Ok(established) => {
            info!(
                "Established session for subject {}",
                established.profile.subject_id
            );
            Ok(established)
        }
        Err(err) => {
            warn!("Session establishment failed, revoking backend session: {err}");
            if let Err(revoke_err) = backend.sign_out(&backend_session.access_token).await {
                warn!("Backend session revocation also failed: {revoke_err}");
            }
            Err(err)
        }
    }
}

fn build_session(
    signer: &SessionSigner,
    backend_session: &BackendSession,
    secure_cookies: bool,
) -> Result<EstablishedSession, AuthError> {
    let profile = VerifiedProfile::from_backend_user(&backend_session.user)
        .map_err(|err| AuthError::IdentityShape(err.to_string()))?;

    let issued = signer
        .issue(&profile, Utc::now().timestamp())
        .map_err(|err| AuthError::Internal(anyhow::Error::new(err).context("token signing")))?;

    let cookies = session_cookies(
        &issued.token,
        backend_session.refresh_token.as_deref(),
        &profile,
        secure_cookies,
    )?;

    Ok(EstablishedSession {
        cookies,
        token: issued.token,
        expires_at: issued.expires_at,
        profile,
    })
}
