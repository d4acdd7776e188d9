//! # Portero (OAuth relay & session issuance)
//!
//! `portero` sits between the Scholatron web frontend and its identity
//! infrastructure. It owns the one security-sensitive flow of the platform:
//! turning a Google sign-in into an application session.
//!
//! ## Sign-in pipeline
//!
//! 1. **Provider exchange** — an OAuth authorization `code` is exchanged at
//!    Google's token endpoint for an ID token, or a pre-issued `credential`
//!    (Google Identity Services) is accepted directly.
//! 2. **Backend verification** — the ID token is verified by the trusted auth
//!    backend, yielding the canonical user record.
//! 3. **Session minting** — a short-lived HS256 session token (`jti` per
//!    issuance, 1 hour TTL) is signed with a server-held secret.
//! 4. **Cookie issuance** — `auth_token`, `refresh_token` and `user_data`
//!    cookies are set atomically: any upstream failure aborts before the first
//!    cookie is attached, and the backend session created in step 2 is
//!    invalidated so no orphan sessions remain.
//!
//! ## Route guard
//!
//! A middleware redirects unauthenticated requests away from `/dashboard` and
//! authenticated requests away from `/login`. The guard verifies the session
//! token's signature and expiry with the same logic used at issuance; cookie
//! presence alone never counts as a session.
//!
//! ## Abuse control
//!
//! `POST /auth/verify-token` is throttled per client address with a fixed
//! window counter (20/60s). This is advisory throttling behind header-derived
//! addresses, not a security boundary; the verification itself is gated by
//! provider-signed tokens.

pub mod api;
pub mod cli;
pub mod portero;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
