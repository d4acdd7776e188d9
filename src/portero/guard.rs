//! Route guard: classifies request paths and redirects based on whether the
//! request carries a valid session token.
//!
//! Possession of the `auth_token` cookie is not enough; the guard verifies the
//! signature and expiry, so a forged or expired cookie is treated exactly like
//! no cookie at all.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::portero::cookies::{extract_cookie, AUTH_COOKIE};
use crate::portero::session::SessionSigner;

pub const LOGIN_PATH: &str = "/login";
pub const LANDING_PATH: &str = "/dashboard";

/// Prefixes that require a valid session.
const PROTECTED_PREFIXES: &[&str] = &["/dashboard"];

/// Pages that only make sense without a session.
const PUBLIC_ONLY_PATHS: &[&str] = &["/login", "/auth/error"];

/// Prefixes the guard never touches: the API itself, static assets and the
/// service's own documentation endpoints.
const EXCLUDED_PREFIXES: &[&str] = &[
    "/api",
    "/assets",
    "/images",
    "/favicon.ico",
    "/swagger-ui",
    "/api-docs",
    "/health",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Pass,
    RedirectToLogin,
    RedirectToLanding,
}

/// Pure routing decision for a path and session state.
#[must_use]
pub fn evaluate(path: &str, has_session: bool) -> GuardDecision {
    if EXCLUDED_PREFIXES
        .iter()
        .any(|prefix| path == *prefix || path.starts_with(&format!("{prefix}/")))
    {
        return GuardDecision::Pass;
    }

    let protected = PROTECTED_PREFIXES
        .iter()
        .any(|prefix| path == *prefix || path.starts_with(&format!("{prefix}/")));
    if protected && !has_session {
        return GuardDecision::RedirectToLogin;
    }

    if PUBLIC_ONLY_PATHS.contains(&path) && has_session {
        return GuardDecision::RedirectToLanding;
    }

    GuardDecision::Pass
}

/// True when the request carries an `auth_token` cookie that verifies against
/// the server secret and has not expired.
#[must_use]
pub fn has_valid_session(headers: &HeaderMap, signer: &SessionSigner) -> bool {
    let Some(token) = extract_cookie(headers, AUTH_COOKIE) else {
        return false;
    };

    match signer.verify(&token, Utc::now().timestamp()) {
        Ok(_) => true,
        Err(err) => {
            debug!("Session cookie rejected: {err}");
            false
        }
    }
}

/// Axum middleware wrapping [`evaluate`].
pub async fn session_guard(
    State(signer): State<Arc<SessionSigner>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let has_session = has_valid_session(request.headers(), &signer);

    match evaluate(&path, has_session) {
        GuardDecision::Pass => next.run(request).await,
        GuardDecision::RedirectToLogin => {
            debug!("Redirecting unauthenticated request for {path} to login");
            Redirect::temporary(LOGIN_PATH).into_response()
        }
        GuardDecision::RedirectToLanding => {
            debug!("Redirecting authenticated request for {path} to landing");
            Redirect::temporary(LANDING_PATH).into_response()
        }
    }
}
