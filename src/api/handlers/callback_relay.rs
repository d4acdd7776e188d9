use axum::{
    extract::{Query, State},
    http::{
        header::{LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::api::handlers::{request_origin, sanitize_next};
use crate::api::AppState;
use crate::portero::{error::AuthError, flow::establish_session, profile::IDENTITY_PROVIDER};

#[derive(Deserialize, Debug)]
pub struct RelayParams {
    pub code: Option<String>,
    pub credential: Option<String>,
    pub next: Option<String>,
}

#[utoipa::path(
    get,
    path= "/auth/callback-relay",
    params(
        ("code" = Option<String>, Query, description = "OAuth authorization code"),
        ("credential" = Option<String>, Query, description = "Pre-issued provider ID token"),
        ("next" = Option<String>, Query, description = "Same-site path to land on after sign-in")
    ),
    responses (
        (status = 303, description = "Session established, cookies set"),
        (status = 400, description = "Neither code nor credential supplied")
    ),
    tag = "auth",
)]
/// Complete a relayed sign-in: exchange the code (or take the credential
/// as-is), create a backend session, set the session cookies and bounce the
/// browser to its destination.
#[instrument(skip_all)]
pub async fn callback_relay(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<RelayParams>,
) -> Result<Response, AuthError> {
    let (id_token, provider_access) = match (params.code, params.credential) {
        (Some(code), _) => {
            // The redirect_uri must match the one the code was issued against,
            // so it is rebuilt from the inbound request.
            let origin = request_origin(&headers).ok_or_else(|| {
                AuthError::Validation("Unable to determine request origin".to_string())
            })?;
            let redirect_uri = format!("{origin}/auth/callback-relay");
            let tokens = state.provider.exchange_code(&code, &redirect_uri).await?;
            (tokens.id_token, tokens.access_token)
        }
        (None, Some(credential)) => (credential, None),
        (None, None) => return Err(AuthError::MissingCredentials),
    };

    let backend_session = state
        .backend
        .sign_in_with_id_token(IDENTITY_PROVIDER, &id_token, provider_access.as_deref())
        .await?;

    let established = establish_session(
        &state.backend,
        &state.signer,
        &backend_session,
        state.secure_cookies,
    )
    .await?;

    let next = sanitize_next(params.next.as_deref());
    debug!("Relay sign-in complete, redirecting to {next}");

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        LOCATION,
        HeaderValue::from_str(&next)
            .map_err(|err| AuthError::Internal(anyhow::Error::new(err).context("location")))?,
    );
    for cookie in established.cookies {
        response_headers.append(SET_COOKIE, cookie);
    }

    Ok((StatusCode::SEE_OTHER, response_headers).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{router, test_support};
    use crate::portero::ProviderClient;
    use anyhow::Result;
    use axum::{routing::post, Json, Router};
    use serde_json::json;

    fn backend_session_json() -> serde_json::Value {
        json!({
            "access_token": "backend-access",
            "refresh_token": "backend-refresh",
            "user": {
                "id": "subject-1",
                "email": "alice@vit.ac.in",
                "user_metadata": {"full_name": "Alice Example"},
                "identities": []
            }
        })
    }

    async fn spawn_mock_backend() -> Result<String> {
        let router = Router::new()
            .route(
                "/auth/v1/token",
                post(|| async { Json(backend_session_json()) }),
            )
            .route(
                "/auth/v1/logout",
                post(|| async { axum::http::StatusCode::NO_CONTENT }),
            );
        test_support::spawn_router(router).await
    }

    fn no_redirect_client() -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?)
    }

    #[tokio::test]
    async fn missing_params_is_missing_oauth_params() -> Result<()> {
        let backend = spawn_mock_backend().await?;
        let state = test_support::test_state(backend)?;
        let base = test_support::spawn_router(router(state)).await?;

        let response = reqwest::get(format!("{base}/auth/callback-relay")).await?;

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await?;
        assert_eq!(body["error"], "missing_oauth_params");
        Ok(())
    }

    #[tokio::test]
    async fn credential_flow_sets_cookies_and_redirects() -> Result<()> {
        let backend = spawn_mock_backend().await?;
        let state = test_support::test_state(backend)?;
        let base = test_support::spawn_router(router(state)).await?;

        let response = no_redirect_client()?
            .get(format!(
                "{base}/auth/callback-relay?credential=provider-id-token&next=/home"
            ))
            .send()
            .await?;

        assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
        assert_eq!(
            response
                .headers()
                .get("location")
                .and_then(|value| value.to_str().ok()),
            Some("/home")
        );

        let cookies: Vec<_> = response.headers().get_all("set-cookie").iter().collect();
        assert_eq!(cookies.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn off_site_next_falls_back_to_root() -> Result<()> {
        let backend = spawn_mock_backend().await?;
        let state = test_support::test_state(backend)?;
        let base = test_support::spawn_router(router(state)).await?;

        let response = no_redirect_client()?
            .get(format!(
                "{base}/auth/callback-relay?credential=provider-id-token&next=https://evil.example"
            ))
            .send()
            .await?;

        assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
        assert_eq!(
            response
                .headers()
                .get("location")
                .and_then(|value| value.to_str().ok()),
            Some("/")
        );
        Ok(())
    }

    #[tokio::test]
    async fn code_flow_exchanges_with_provider() -> Result<()> {
        let provider_router = Router::new().route(
            "/token",
            post(|| async {
                Json(json!({
                    "id_token": "provider-id-token",
                    "access_token": "provider-access-token",
                }))
            }),
        );
        let provider_base = test_support::spawn_router(provider_router).await?;

        let backend = spawn_mock_backend().await?;
        let mut state = test_support::test_state(backend)?;
        state.provider = ProviderClient::new(&test_support::test_globals())?
            .with_token_url(format!("{provider_base}/token"));
        let base = test_support::spawn_router(router(state)).await?;

        let response = no_redirect_client()?
            .get(format!("{base}/auth/callback-relay?code=auth-code&next=/dashboard"))
            .header("origin", "https://app.scholatron.app")
            .send()
            .await?;

        assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
        assert_eq!(
            response
                .headers()
                .get("location")
                .and_then(|value| value.to_str().ok()),
            Some("/dashboard")
        );
        Ok(())
    }

    #[tokio::test]
    async fn provider_rejection_surfaces_exchange_error() -> Result<()> {
        let provider_router = Router::new().route(
            "/token",
            post(|| async {
                (
                    axum::http::StatusCode::BAD_REQUEST,
                    Json(json!({"error": "invalid_grant"})),
                )
            }),
        );
        let provider_base = test_support::spawn_router(provider_router).await?;

        let backend = spawn_mock_backend().await?;
        let mut state = test_support::test_state(backend)?;
        state.provider = ProviderClient::new(&test_support::test_globals())?
            .with_token_url(format!("{provider_base}/token"));
        let base = test_support::spawn_router(router(state)).await?;

        let response = no_redirect_client()?
            .get(format!("{base}/auth/callback-relay?code=used-code"))
            .header("origin", "https://app.scholatron.app")
            .send()
            .await?;

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        // No cookies on failure.
        assert!(response.headers().get("set-cookie").is_none());
        let body: serde_json::Value = response.json().await?;
        assert_eq!(body["error"], "google_token_error");
        assert_eq!(body["details"]["error"], "invalid_grant");
        Ok(())
    }
}
