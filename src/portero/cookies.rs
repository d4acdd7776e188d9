//! Session cookie encoding and extraction.
//!
//! Three cookies make up a browser session: the signed session token, the
//! backend refresh token, and a client-readable copy of the verified profile.
//! All cookie values are built before any is attached to a response, so a
//! response never carries a partial cookie set.

use axum::http::{header::COOKIE, HeaderMap, HeaderValue};
use base64ct::{Base64UrlUnpadded, Encoding};

use crate::portero::error::AuthError;
use crate::portero::profile::VerifiedProfile;

pub const AUTH_COOKIE: &str = "auth_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const USER_COOKIE: &str = "user_data";

pub const AUTH_COOKIE_MAX_AGE: u64 = 3600; // 1 hour
pub const REFRESH_COOKIE_MAX_AGE: u64 = 604_800; // 7 days
pub const USER_COOKIE_MAX_AGE: u64 = 3600; // 1 hour

fn build_cookie(
    name: &str,
    value: &str,
    max_age: u64,
    secure: bool,
) -> Result<HeaderValue, AuthError> {
    let mut cookie = format!("{name}={value}; Max-Age={max_age}; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|err| AuthError::Internal(anyhow::Error::new(err).context("invalid cookie value")))
}

/// Build the full session cookie set.
///
/// The profile is serialized to JSON and base64url-encoded so it survives the
/// cookie value grammar. The refresh cookie is only present when the backend
/// issued a refresh token.
///
/// # Errors
/// Fails if any value cannot be encoded as a header; in that case no cookie is
/// produced at all.
pub fn session_cookies(
    session_token: &str,
    refresh_token: Option<&str>,
    profile: &VerifiedProfile,
    secure: bool,
) -> Result<Vec<HeaderValue>, AuthError> {
    let profile_json = serde_json::to_vec(profile)
        .map_err(|err| AuthError::Internal(anyhow::Error::new(err).context("profile encoding")))?;
    let profile_b64 = Base64UrlUnpadded::encode_string(&profile_json);

    let mut cookies = vec![build_cookie(
        AUTH_COOKIE,
        session_token,
        AUTH_COOKIE_MAX_AGE,
        secure,
    )?];
    if let Some(refresh) = refresh_token {
        cookies.push(build_cookie(
            REFRESH_COOKIE,
            refresh,
            REFRESH_COOKIE_MAX_AGE,
            secure,
        )?);
    }
    cookies.push(build_cookie(
        USER_COOKIE,
        &profile_b64,
        USER_COOKIE_MAX_AGE,
        secure,
    )?);

    Ok(cookies)
}

/// Expire all three session cookies.
#[must_use]
pub fn clear_session_cookies(secure: bool) -> Vec<HeaderValue> {
    [AUTH_COOKIE, REFRESH_COOKIE, USER_COOKIE]
        .iter()
        .filter_map(|name| build_cookie(name, "", 0, secure).ok())
        .collect()
}

/// Extract a cookie value from the request `Cookie` header.
#[must_use]
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

/// Decode the `user_data` cookie back into a profile.
#[must_use]
pub fn decode_user_cookie(value: &str) -> Option<VerifiedProfile> {
    let json = Base64UrlUnpadded::decode_vec(value).ok()?;
    serde_json::from_slice(&json).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_profile() -> VerifiedProfile {
        VerifiedProfile {
            subject_id: "subject-1".to_string(),
            provider_id: None,
            email: Some("alice@vit.ac.in".to_string()),
            display_name: Some("Alice Example".to_string()),
            username: Some("alice01".to_string()),
            avatar_url: None,
            roles: vec!["user".to_string()],
            permissions: vec!["read:profile".to_string(), "update:profile".to_string()],
        }
    }

    #[test]
    fn full_set_with_refresh_token() -> anyhow::Result<()> {
        let cookies = session_cookies("jwt-token", Some("refresh-1"), &test_profile(), true)
            .map_err(|err| anyhow::anyhow!("{err}"))?;
        assert_eq!(cookies.len(), 3);

        let auth = cookies[0].to_str()?;
        assert!(auth.starts_with("auth_token=jwt-token; Max-Age=3600; "));
        assert!(auth.contains("Path=/"));
        assert!(auth.contains("HttpOnly"));
        assert!(auth.contains("SameSite=Lax"));
        assert!(auth.ends_with("Secure"));

        let refresh = cookies[1].to_str()?;
        assert!(refresh.starts_with("refresh_token=refresh-1; Max-Age=604800; "));

        let user = cookies[2].to_str()?;
        assert!(user.starts_with("user_data="));
        Ok(())
    }

    #[test]
    fn refresh_cookie_skipped_when_absent() -> anyhow::Result<()> {
        let cookies = session_cookies("jwt-token", None, &test_profile(), false)
            .map_err(|err| anyhow::anyhow!("{err}"))?;
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].to_str()?.starts_with("auth_token="));
        assert!(cookies[1].to_str()?.starts_with("user_data="));
        Ok(())
    }

    #[test]
    fn secure_only_in_production() -> anyhow::Result<()> {
        let cookies = session_cookies("jwt-token", None, &test_profile(), false)
            .map_err(|err| anyhow::anyhow!("{err}"))?;
        for cookie in &cookies {
            assert!(!cookie.to_str()?.contains("Secure"));
        }
        Ok(())
    }

    #[test]
    fn user_cookie_round_trips_the_profile() -> anyhow::Result<()> {
        let profile = test_profile();
        let cookies = session_cookies("jwt-token", None, &profile, true)
            .map_err(|err| anyhow::anyhow!("{err}"))?;
        let user = cookies[1].to_str()?;
        let value = user
            .strip_prefix("user_data=")
            .and_then(|rest| rest.split(';').next())
            .unwrap_or_default();

        let decoded = decode_user_cookie(value)
            .ok_or_else(|| anyhow::anyhow!("user cookie did not decode"))?;
        assert_eq!(decoded, profile);
        Ok(())
    }

    #[test]
    fn clear_set_expires_all_three() {
        let cookies = clear_session_cookies(true);
        assert_eq!(cookies.len(), 3);
        for cookie in &cookies {
            let value = cookie.to_str().unwrap_or_default();
            assert!(value.contains("Max-Age=0"));
            assert!(value.contains("Path=/"));
        }
    }

    #[test]
    fn extract_cookie_finds_named_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; auth_token=abc.def.ghi; lang=en"),
        );
        assert_eq!(
            extract_cookie(&headers, AUTH_COOKIE).as_deref(),
            Some("abc.def.ghi")
        );
        assert!(extract_cookie(&headers, "missing").is_none());
    }

    #[test]
    fn extract_cookie_ignores_empty_values() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("auth_token="));
        assert!(extract_cookie(&headers, AUTH_COOKIE).is_none());
    }
}
