//! HTTP surface: router, middleware stack and server bootstrap.

use crate::{
    api::handlers::{callback, callback_relay, health, logout, verify_token},
    cli::globals::GlobalArgs,
    portero::{
        backend::BackendClient,
        guard,
        rate_limit::{FixedWindowLimiter, RateLimiter},
        session::SessionSigner,
        ProviderClient,
    },
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;

pub use openapi::ApiDoc;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub provider: ProviderClient,
    pub backend: BackendClient,
    pub signer: Arc<SessionSigner>,
    pub limiter: Arc<dyn RateLimiter>,
    pub secure_cookies: bool,
}

/// Build the application router for the given state.
pub fn router(state: AppState) -> Router {
    let signer = Arc::clone(&state.signer);

    Router::new()
        .route("/auth/verify-token", post(verify_token::verify_token))
        .route("/auth/callback-relay", get(callback_relay::callback_relay))
        .route("/auth/callback", get(callback::callback))
        .route("/auth/logout", post(logout::logout))
        .route("/health", get(health::health).options(health::health))
        .with_state(state)
        .layer(middleware::from_fn_with_state(signer, guard::session_guard))
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, globals: &GlobalArgs) -> Result<()> {
    // A missing signing secret in production must stop the process here,
    // before the listener ever opens.
    let signer = Arc::new(
        SessionSigner::from_globals(globals)
            .map_err(|err| anyhow::anyhow!("{err}"))
            .context("Session signing configuration")?,
    );

    let state = AppState {
        provider: ProviderClient::new(globals)?,
        backend: BackendClient::new(globals)?,
        signer,
        limiter: Arc::new(FixedWindowLimiter::default()),
        secure_cookies: globals.environment.is_production(),
    };

    let cors = CorsLayer::new()
        // allow `GET` and `POST` when accessing the resource
        .allow_methods([Method::GET, Method::POST])
        // allow requests from any origin
        .allow_origin(Any);

    let app = router(state)
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors),
        );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, ?headers, request_id)
}
