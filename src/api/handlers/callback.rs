use axum::{
    extract::{Query, State},
    http::{
        header::{LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::form_urlencoded;

use crate::api::AppState;
use crate::portero::{error::AuthError, flow::establish_session};

const ERROR_PAGE: &str = "/auth/error";
const SUCCESS_PATH: &str = "/home";

#[derive(Deserialize, Debug)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[utoipa::path(
    get,
    path= "/auth/callback",
    params(
        ("code" = Option<String>, Query, description = "PKCE authorization code"),
        ("error" = Option<String>, Query, description = "Provider error code"),
        ("error_description" = Option<String>, Query, description = "Provider error detail")
    ),
    responses (
        (status = 303, description = "Redirect: /home with cookies on success, the error page otherwise")
    ),
    tag = "auth",
)]
/// Complete a PKCE sign-in. This is a browser-facing endpoint, so every
/// failure becomes a redirect to the error page instead of a JSON body.
#[instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(provider_error) = params.error {
        warn!("Provider returned error on callback: {provider_error}");
        let description = params
            .error_description
            .unwrap_or_else(|| "Sign-in was cancelled or rejected by the provider".to_string());
        return error_redirect(&provider_error, &description);
    }

    let Some(code) = params.code else {
        let err = AuthError::MissingCredentials;
        return error_redirect(err.kind(), &err.public_message());
    };

    let backend_session = match state.backend.exchange_code_for_session(&code).await {
        Ok(session) => session,
        Err(err) => {
            warn!("Callback code exchange failed: {err}");
            return error_redirect(err.kind(), &err.public_message());
        }
    };

    let established = match establish_session(
        &state.backend,
        &state.signer,
        &backend_session,
        state.secure_cookies,
    )
    .await
    {
        Ok(established) => established,
        Err(err) => {
            warn!("Callback session establishment failed: {err}");
            return error_redirect(err.kind(), &err.public_message());
        }
    };

    debug!("Callback sign-in complete, redirecting to {SUCCESS_PATH}");

    let mut headers = HeaderMap::new();
    headers.insert(LOCATION, HeaderValue::from_static(SUCCESS_PATH));
    for cookie in established.cookies {
        headers.append(SET_COOKIE, cookie);
    }

    (StatusCode::SEE_OTHER, headers).into_response()
}

fn error_redirect(error: &str, description: &str) -> Response {
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("error", error)
        .append_pair("description", description)
        .finish();
    let location = format!("{ERROR_PAGE}?{query}");

    match HeaderValue::from_str(&location) {
        Ok(value) => {
            let mut headers = HeaderMap::new();
            headers.insert(LOCATION, value);
            (StatusCode::SEE_OTHER, headers).into_response()
        }
        // Percent-encoded output is always a valid header value; this arm is
        // unreachable but must not panic.
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
