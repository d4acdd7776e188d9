use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::{debug, instrument};

use crate::api::AppState;
use crate::portero::cookies::clear_session_cookies;

#[utoipa::path(
    post,
    path= "/auth/logout",
    responses (
        (status = 204, description = "Session cookies cleared")
    ),
    tag = "auth",
)]
/// Clear the session cookies. Idempotent: logging out without a session is
/// still a 204.
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    debug!("Clearing session cookies");

    let mut headers = HeaderMap::new();
    for cookie in clear_session_cookies(state.secure_cookies) {
        headers.append(SET_COOKIE, cookie);
    }

    (StatusCode::NO_CONTENT, headers)
}
