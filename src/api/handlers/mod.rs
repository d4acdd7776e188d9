pub mod health;
pub use self::health::health;

pub mod verify_token;
pub use self::verify_token::verify_token;

pub mod callback_relay;
pub use self::callback_relay::callback_relay;

pub mod callback;
pub use self::callback::callback;

pub mod logout;
pub use self::logout::logout;

// common functions for the handlers
use axum::http::{header::ORIGIN, HeaderMap};

/// Reconstruct the external origin of a request, for building the exact
/// `redirect_uri` the provider validated the authorization code against.
///
/// Precedence: `Origin` header, then `x-forwarded-proto` + `x-forwarded-host`
/// (reverse proxy), then the raw `Host` header assuming https.
#[must_use]
pub fn request_origin(headers: &HeaderMap) -> Option<String> {
    if let Some(origin) = headers.get(ORIGIN).and_then(|value| value.to_str().ok()) {
        let origin = origin.trim().trim_end_matches('/');
        if !origin.is_empty() {
            return Some(origin.to_string());
        }
    }

    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    if let Some(host) = headers
        .get("x-forwarded-host")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return Some(format!("{}://{host}", proto.unwrap_or("https")));
    }

    headers
        .get("host")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|host| format!("{}://{host}", proto.unwrap_or("https")))
}

/// Accept only same-site absolute paths as post-login redirect targets;
/// anything else (external URLs, scheme-relative `//host`) falls back to `/`.
#[must_use]
pub fn sanitize_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_string(),
        _ => "/".to_string(),
    }
}
