//! Session backend verifier: exchanges provider identity assertions for
//! backend sessions and canonical user records.

use anyhow::Context;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

use crate::cli::globals::GlobalArgs;
use crate::portero::error::AuthError;
use crate::APP_USER_AGENT;

const BACKEND_TIMEOUT_SECONDS: u64 = 10;

/// Identity tokens above this size are rejected before any backend call.
pub const MAX_IDENTITY_TOKEN_BYTES: usize = 4096;

/// One entry of the backend user's linked-identity list.
#[derive(Deserialize, Debug, Clone)]
pub struct BackendIdentity {
    pub provider: String,
    pub provider_id: Option<String>,
    pub identity_data: Option<Map<String, Value>>,
}

/// Canonical user record as returned by the auth backend.
#[derive(Deserialize, Debug, Clone)]
pub struct BackendUser {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub identities: Option<Vec<BackendIdentity>>,
}

/// A durable backend session plus the verified user it belongs to.
#[derive(Deserialize, Debug)]
pub struct BackendSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: BackendUser,
}

/// HTTP client for the trusted auth backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl BackendClient {
    /// Build the client from global configuration.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(globals: &GlobalArgs) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(BACKEND_TIMEOUT_SECONDS))
            .build()
            .context("Failed to build backend HTTP client")?;

        Ok(Self {
            client,
            base_url: globals.backend_url.trim_end_matches('/').to_string(),
            api_key: globals.backend_key.clone(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Verify an identity token and return the canonical user record.
    ///
    /// # Errors
    /// `Validation` for an empty or oversized token, `InvalidToken` when the
    /// backend rejects it, `BackendTimeout` when the backend does not answer.
    #[instrument(skip(self, token))]
    pub async fn get_user(&self, token: &str) -> Result<BackendUser, AuthError> {
        check_token_size(token)?;

        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(token)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::InvalidToken(format!(
                "backend rejected identity token with status {status}"
            )));
        }
        if !status.is_success() {
            error!("Backend user lookup failed: {status}");
            return Err(AuthError::Internal(anyhow::anyhow!(
                "backend user lookup failed with status {status}"
            )));
        }

        let user = response.json::<BackendUser>().await.map_err(|err| {
            error!("Failed to decode backend user: {err}");
            AuthError::Internal(anyhow::Error::new(err).context("invalid backend user response"))
        })?;

        debug!("Verified identity token for subject {}", user.id);

        Ok(user)
    }

    /// Exchange a provider ID token for a durable backend session.
    ///
    /// # Errors
    /// Same taxonomy as [`Self::get_user`].
    #[instrument(skip(self, id_token, access_token))]
    pub async fn sign_in_with_id_token(
        &self,
        provider: &str,
        id_token: &str,
        access_token: Option<&str>,
    ) -> Result<BackendSession, AuthError> {
        check_token_size(id_token)?;

        let mut body = json!({
            "provider": provider,
            "id_token": id_token,
        });
        if let Some(access_token) = access_token {
            body["access_token"] = json!(access_token);
        }

        self.token_grant("id_token", body).await
    }

    /// Exchange a PKCE authorization code for a backend session.
    ///
    /// # Errors
    /// Same taxonomy as [`Self::get_user`].
    #[instrument(skip(self, auth_code))]
    pub async fn exchange_code_for_session(
        &self,
        auth_code: &str,
    ) -> Result<BackendSession, AuthError> {
        check_token_size(auth_code)?;

        self.token_grant("pkce", json!({ "auth_code": auth_code }))
            .await
    }

    /// Invalidate a backend session. Compensating action for the sign-in
    /// saga; failures are logged and swallowed by callers.
    ///
    /// # Errors
    /// Returns an error when the backend call fails or answers non-success.
    #[instrument(skip(self, access_token))]
    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!("Backend sign-out answered {status}");
            return Err(AuthError::Internal(anyhow::anyhow!(
                "backend sign-out failed with status {status}"
            )));
        }

        Ok(())
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: Value,
    ) -> Result<BackendSession, AuthError> {
        let response = self
            .client
            .post(format!(
                "{}/auth/v1/token?grant_type={grant_type}",
                self.base_url
            ))
            .header("apikey", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_client_error() {
            let details = response
                .json::<Value>()
                .await
                .unwrap_or(Value::Null);
            return Err(AuthError::InvalidToken(format!(
                "backend sign-in rejected with status {status}: {details}"
            )));
        }
        if !status.is_success() {
            error!("Backend sign-in failed: {status}");
            return Err(AuthError::Internal(anyhow::anyhow!(
                "backend sign-in failed with status {status}"
            )));
        }

        response.json::<BackendSession>().await.map_err(|err| {
            error!("Failed to decode backend session: {err}");
            AuthError::Internal(anyhow::Error::new(err).context("invalid backend session response"))
        })
    }
}

fn check_token_size(token: &str) -> Result<(), AuthError> {
    if token.is_empty() {
        return Err(AuthError::Validation("Missing or invalid token".to_string()));
    }
    if token.len() > MAX_IDENTITY_TOKEN_BYTES {
        return Err(AuthError::Validation(format!(
            "Token exceeds {MAX_IDENTITY_TOKEN_BYTES} bytes"
        )));
    }
    Ok(())
}

fn map_transport_error(err: reqwest::Error) -> AuthError {
    if err.is_timeout() {
        error!("Backend call timed out");
        AuthError::BackendTimeout
    } else {
        error!("Backend call failed: {err}");
        AuthError::Internal(anyhow::Error::new(err).context("auth backend unreachable"))
    }
}
