use utoipa::OpenApi;

use crate::api::handlers::{callback, callback_relay, health, logout, verify_token};
use crate::portero::profile::VerifiedProfile;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        verify_token::verify_token,
        callback_relay::callback_relay,
        callback::callback,
        logout::logout,
    ),
    components(schemas(
        health::Health,
        verify_token::VerifyTokenRequest,
        verify_token::VerifyTokenResponse,
        VerifiedProfile,
    )),
    tags(
        (name = "auth", description = "OAuth relay and session issuance"),
        (name = "health", description = "Service build and liveness info")
    )
)]
pub struct ApiDoc;
