//! Identity provider client: server-to-server OAuth code exchange with Google.

use anyhow::Context;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, instrument};

use crate::cli::globals::GlobalArgs;
use crate::portero::error::AuthError;
use crate::APP_USER_AGENT;

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const EXCHANGE_TIMEOUT_SECONDS: u64 = 10;

/// Tokens returned by the provider's token endpoint.
#[derive(Deserialize, Debug)]
pub struct ProviderTokens {
    pub id_token: String,
    pub access_token: Option<String>,
}

/// Performs the authorization-code exchange against the provider.
///
/// Credential-flow sign-ins (a pre-issued ID token) never touch this client;
/// the handler passes the credential straight to the backend verifier.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
}

impl ProviderClient {
    /// Build the client from global configuration.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(globals: &GlobalArgs) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(EXCHANGE_TIMEOUT_SECONDS))
            .build()
            .context("Failed to build provider HTTP client")?;

        Ok(Self {
            client,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            client_id: globals.google_client_id.clone(),
            client_secret: globals.google_client_secret.clone(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_token_url(mut self, token_url: String) -> Self {
        self.token_url = token_url;
        self
    }

    /// Exchange an authorization code for provider tokens.
    ///
    /// `redirect_uri` must be byte-for-byte the URI the code was issued
    /// against; providers enforce exact-match validation.
    ///
    /// # Errors
    /// `ProviderTimeout` when the endpoint does not answer in time,
    /// `ProviderExchange` carrying the provider's status and payload on a
    /// non-success response.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<ProviderTokens, AuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    error!("Provider token exchange timed out");
                    AuthError::ProviderTimeout
                } else {
                    error!("Provider token exchange failed: {err}");
                    AuthError::Internal(
                        anyhow::Error::new(err).context("provider token endpoint unreachable"),
                    )
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let details = response
                .json::<serde_json::Value>()
                .await
                .unwrap_or(serde_json::Value::Null);
            error!("Provider rejected code exchange: {status} {details}");
            return Err(AuthError::ProviderExchange {
                status: status.as_u16(),
                details,
            });
        }

        let tokens = response.json::<ProviderTokens>().await.map_err(|err| {
            error!("Failed to decode provider token response: {err}");
            AuthError::Internal(anyhow::Error::new(err).context("invalid provider token response"))
        })?;

        debug!("Provider code exchange succeeded");

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::{routing::post, Json, Router};
    use secrecy::SecretString;
    use tokio::net::TcpListener;

    fn test_client(token_url: String) -> Result<ProviderClient> {
        let mut globals = GlobalArgs::new(
            "client-id".to_string(),
            "https://auth.scholatron.app".to_string(),
        );
        globals.set_google_client_secret(SecretString::from("client-secret".to_string()));
        Ok(ProviderClient::new(&globals)?.with_token_url(token_url))
    }

    async fn spawn_token_endpoint(router: Router) -> Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router.into_make_service()).await;
        });
        Ok(format!("http://{addr}/token"))
    }

    #[tokio::test]
    async fn exchange_code_returns_tokens() -> Result<()> {
        let router = Router::new().route(
            "/token",
            post(|| async {
                Json(serde_json::json!({
                    "id_token": "provider-id-token",
                    "access_token": "provider-access-token",
                    "token_type": "Bearer",
                    "expires_in": 3599,
                }))
            }),
        );
        let url = spawn_token_endpoint(router).await?;
        let client = test_client(url)?;

        let tokens = client
            .exchange_code("auth-code", "https://app.scholatron.app/auth/callback-relay")
            .await
            .map_err(|err| anyhow::anyhow!("exchange failed: {err}"))?;

        assert_eq!(tokens.id_token, "provider-id-token");
        assert_eq!(tokens.access_token.as_deref(), Some("provider-access-token"));
        Ok(())
    }

    #[tokio::test]
    async fn exchange_code_surfaces_provider_rejection() -> Result<()> {
        let router = Router::new().route(
            "/token",
            post(|| async {
                (
                    axum::http::StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({"error": "invalid_grant"})),
                )
            }),
        );
        let url = spawn_token_endpoint(router).await?;
        let client = test_client(url)?;

        let result = client
            .exchange_code("used-code", "https://app.scholatron.app/auth/callback-relay")
            .await;

        assert!(matches!(
            result,
            Err(AuthError::ProviderExchange { status: 400, ref details })
                if details["error"] == "invalid_grant"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn exchange_code_fails_without_endpoint() -> Result<()> {
        let client = test_client("http://127.0.0.1:1/token".to_string())?;

        let result = client
            .exchange_code("auth-code", "https://app.scholatron.app/auth/callback-relay")
            .await;

        assert!(matches!(
            result,
            Err(AuthError::Internal(_) | AuthError::ProviderTimeout)
        ));
        Ok(())
    }
}
