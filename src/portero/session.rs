//! Application session tokens: HS256-signed JWTs minted once per successful
//! verification and checked on every guarded request.

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::cli::globals::GlobalArgs;
use crate::portero::error::AuthError;
use crate::portero::profile::VerifiedProfile;

pub const SESSION_TTL_SECONDS: i64 = 3600; // 1 hour
pub const ISSUER: &str = "scholatron-api";
pub const AUDIENCE: &str = "scholatron-app";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionTokenHeader {
    pub alg: String,
    pub typ: String,
}

impl SessionTokenHeader {
    fn hs256() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Claims carried by a session token. The verified profile is embedded so the
/// route guard never re-fetches the user record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionTokenClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub user: VerifiedProfile,
}

impl SessionTokenClaims {
    /// Build claims for one issuance. `jti` is unique per call and is the
    /// replay/audit correlation handle downstream.
    #[must_use]
    pub fn new(profile: &VerifiedProfile, now_unix_seconds: i64, jti: String) -> Self {
        Self {
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            sub: profile.subject_id.clone(),
            iat: now_unix_seconds,
            exp: now_unix_seconds + SESSION_TTL_SECONDS,
            jti,
            email: profile.email.clone(),
            username: profile.username.clone().or_else(|| profile.display_name.clone()),
            user: profile.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid key")]
    Key,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid audience")]
    InvalidAudience,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Create an HS256-signed session token (JWT).
///
/// Pure function of (claims, secret): no I/O, no clock reads, no randomness.
///
/// # Errors
///
/// Returns an error if header/claims JSON cannot be encoded or the key is
/// unusable.
pub fn sign_hs256(secret: &[u8], claims: &SessionTokenClaims) -> Result<String, Error> {
    let header_b64 = b64e_json(&SessionTokenHeader::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| Error::Key)?;
    mac.update(signing_input.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify an HS256 session token and return its decoded claims.
///
/// # Errors
///
/// Returns an error if:
/// - the token is malformed or contains invalid base64/json,
/// - the signature does not verify against the secret,
/// - the claims fail validation (`iss`, `aud`, `exp`).
pub fn verify_hs256(
    token: &str,
    secret: &[u8],
    expected_issuer: &str,
    expected_audience: &str,
    now_unix_seconds: i64,
) -> Result<SessionTokenClaims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let header: SessionTokenHeader = b64d_json(header_b64)?;
    if header.alg != "HS256" {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| Error::Key)?;
    mac.update(signing_input.as_bytes());
    // verify_slice is constant-time
    mac.verify_slice(&signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: SessionTokenClaims = b64d_json(claims_b64)?;
    if claims.iss != expected_issuer {
        return Err(Error::InvalidIssuer);
    }
    if claims.aud != expected_audience {
        return Err(Error::InvalidAudience);
    }
    if claims.exp <= now_unix_seconds {
        return Err(Error::Expired);
    }

    Ok(claims)
}

/// A freshly minted session token.
#[derive(Debug)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
    pub jti: String,
}

/// Holds the server signing secret and mints/verifies session tokens.
#[derive(Debug, Clone)]
pub struct SessionSigner {
    secret: SecretString,
}

impl SessionSigner {
    /// Resolve the signing secret from configuration.
    ///
    /// In production a missing or empty secret is fatal: the process must
    /// refuse to serve rather than fall back to a guessable default. In
    /// development a random per-process secret is generated so local sign-in
    /// works without configuration (sessions do not survive restarts).
    ///
    /// # Errors
    /// `SigningConfiguration` when the secret is absent in production.
    pub fn from_globals(globals: &GlobalArgs) -> Result<Self, AuthError> {
        match globals.session_secret.as_ref() {
            Some(secret) if !secret.expose_secret().is_empty() => Ok(Self {
                secret: secret.clone(),
            }),
            _ if globals.environment.is_production() => Err(AuthError::SigningConfiguration(
                "session signing secret is required in production".to_string(),
            )),
            _ => {
                warn!("No session secret configured; generating a random development secret");
                let mut bytes = [0u8; 32];
                rand::rngs::OsRng.fill_bytes(&mut bytes);
                Ok(Self {
                    secret: SecretString::from(Base64UrlUnpadded::encode_string(&bytes)),
                })
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn from_secret(secret: &str) -> Self {
        Self {
            secret: SecretString::from(secret.to_string()),
        }
    }

    /// Mint a session token for a verified profile.
    ///
    /// # Errors
    /// Returns an error when claim encoding or signing fails.
    pub fn issue(
        &self,
        profile: &VerifiedProfile,
        now_unix_seconds: i64,
    ) -> Result<IssuedToken, Error> {
        let jti = Uuid::new_v4().to_string();
        let claims = SessionTokenClaims::new(profile, now_unix_seconds, jti.clone());
        let token = sign_hs256(self.secret.expose_secret().as_bytes(), &claims)?;

        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
            jti,
        })
    }

    /// Verify a session token against the server secret.
    ///
    /// # Errors
    /// See [`verify_hs256`].
    pub fn verify(
        &self,
        token: &str,
        now_unix_seconds: i64,
    ) -> Result<SessionTokenClaims, Error> {
        verify_hs256(
            token,
            self.secret.expose_secret().as_bytes(),
            ISSUER,
            AUDIENCE,
            now_unix_seconds,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::globals::Environment;

    const GOLDEN_SECRET: &[u8] = b"portero-golden-secret";

    // Fixed claims for stable golden vectors.
    const NOW: i64 = 1_700_000_000;
    const GOLDEN_VECTOR_1: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJpc3MiOiJzY2hvbGF0cm9uLWFwaSIsImF1ZCI6InNjaG9sYXRyb24tYXBwIiwic3ViIjoic3ViamVjdC0xIiwiaWF0IjoxNzAwMDAwMDAwLCJleHAiOjE3MDAwMDM2MDAsImp0aSI6Imp0aS0xIiwiZW1haWwiOiJhbGljZUB2aXQuYWMuaW4iLCJ1c2VybmFtZSI6ImFsaWNlMDEiLCJ1c2VyIjp7InN1YmplY3RfaWQiOiJzdWJqZWN0LTEiLCJwcm92aWRlcl9pZCI6Imdvb2dsZS0xMjMiLCJlbWFpbCI6ImFsaWNlQHZpdC5hYy5pbiIsImRpc3BsYXlfbmFtZSI6IkFsaWNlIEV4YW1wbGUiLCJ1c2VybmFtZSI6ImFsaWNlMDEiLCJhdmF0YXJfdXJsIjoiaHR0cHM6Ly9saDMuZXhhbXBsZS9hdmF0YXIucG5nIiwicm9sZXMiOlsidXNlciJdLCJwZXJtaXNzaW9ucyI6WyJyZWFkOnByb2ZpbGUiLCJ1cGRhdGU6cHJvZmlsZSJdfX0.7hwz9xTthVSmSSjW-RA5hOZFyfJ94S--gm9vNVMwIbI";
    const GOLDEN_VECTOR_2: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.eyJpc3MiOiJzY2hvbGF0cm9uLWFwaSIsImF1ZCI6InNjaG9sYXRyb24tYXBwIiwic3ViIjoic3ViamVjdC0xIiwiaWF0IjoxNzAwMDAwMDAwLCJleHAiOjE3MDAwMDM2MDAsImp0aSI6Imp0aS0yIiwiZW1haWwiOiJhbGljZUB2aXQuYWMuaW4iLCJ1c2VybmFtZSI6ImFsaWNlMDEiLCJ1c2VyIjp7InN1YmplY3RfaWQiOiJzdWJqZWN0LTEiLCJwcm92aWRlcl9pZCI6Imdvb2dsZS0xMjMiLCJlbWFpbCI6ImFsaWNlQHZpdC5hYy5pbiIsImRpc3BsYXlfbmFtZSI6IkFsaWNlIEV4YW1wbGUiLCJ1c2VybmFtZSI6ImFsaWNlMDEiLCJhdmF0YXJfdXJsIjoiaHR0cHM6Ly9saDMuZXhhbXBsZS9hdmF0YXIucG5nIiwicm9sZXMiOlsidXNlciJdLCJwZXJtaXNzaW9ucyI6WyJyZWFkOnByb2ZpbGUiLCJ1cGRhdGU6cHJvZmlsZSJdfX0.bk--jlqzFPZ6xoCbhA0QDLfYadyynkWjSz4g34EFm_Q";

    fn test_profile() -> VerifiedProfile {
        VerifiedProfile {
            subject_id: "subject-1".to_string(),
            provider_id: Some("google-123".to_string()),
            email: Some("alice@vit.ac.in".to_string()),
            display_name: Some("Alice Example".to_string()),
            username: Some("alice01".to_string()),
            avatar_url: Some("https://lh3.example/avatar.png".to_string()),
            roles: vec!["user".to_string()],
            permissions: vec!["read:profile".to_string(), "update:profile".to_string()],
        }
    }

    fn test_claims(jti: &str) -> SessionTokenClaims {
        SessionTokenClaims::new(&test_profile(), NOW, jti.to_string())
    }

    #[test]
    fn golden_vector_1_sign_and_verify() -> Result<(), Error> {
        let token = sign_hs256(GOLDEN_SECRET, &test_claims("jti-1"))?;

        // Golden token string (stable because HS256 is deterministic and claims are fixed).
        assert_eq!(token, GOLDEN_VECTOR_1);

        let verified = verify_hs256(&token, GOLDEN_SECRET, ISSUER, AUDIENCE, NOW)?;
        assert_eq!(verified.jti, "jti-1");
        assert_eq!(verified.user.subject_id, "subject-1");
        Ok(())
    }

    #[test]
    fn golden_vector_2_sign_and_verify() -> Result<(), Error> {
        let token = sign_hs256(GOLDEN_SECRET, &test_claims("jti-2"))?;

        assert_eq!(token, GOLDEN_VECTOR_2);

        let verified = verify_hs256(&token, GOLDEN_SECRET, ISSUER, AUDIENCE, NOW)?;
        assert_eq!(verified.jti, "jti-2");
        Ok(())
    }

    #[test]
    fn rejects_expired_wrong_audience_or_issuer() -> Result<(), Error> {
        let token = sign_hs256(GOLDEN_SECRET, &test_claims("jti-x"))?;

        let result = verify_hs256(&token, GOLDEN_SECRET, ISSUER, "wrong-aud", NOW);
        assert!(matches!(result, Err(Error::InvalidAudience)));

        let result = verify_hs256(&token, GOLDEN_SECRET, "wrong-iss", AUDIENCE, NOW);
        assert!(matches!(result, Err(Error::InvalidIssuer)));

        let result = verify_hs256(
            &token,
            GOLDEN_SECRET,
            ISSUER,
            AUDIENCE,
            NOW + SESSION_TTL_SECONDS,
        );
        assert!(matches!(result, Err(Error::Expired)));

        Ok(())
    }

    #[test]
    fn rejects_tampered_signature_and_wrong_secret() -> Result<(), Error> {
        let token = sign_hs256(GOLDEN_SECRET, &test_claims("jti-x"))?;

        let mut tampered = token.clone();
        tampered.pop();
        tampered.push('A');
        let result = verify_hs256(&tampered, GOLDEN_SECRET, ISSUER, AUDIENCE, NOW);
        assert!(matches!(
            result,
            Err(Error::InvalidSignature | Error::Base64)
        ));

        let result = verify_hs256(&token, b"other-secret", ISSUER, AUDIENCE, NOW);
        assert!(matches!(result, Err(Error::InvalidSignature)));

        Ok(())
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(matches!(
            verify_hs256("a.b", GOLDEN_SECRET, ISSUER, AUDIENCE, NOW),
            Err(Error::TokenFormat | Error::Base64)
        ));
        assert!(matches!(
            verify_hs256("a.b.c.d", GOLDEN_SECRET, ISSUER, AUDIENCE, NOW),
            Err(Error::TokenFormat)
        ));
        assert!(matches!(
            verify_hs256("not-a-jwt", GOLDEN_SECRET, ISSUER, AUDIENCE, NOW),
            Err(Error::TokenFormat)
        ));
    }

    #[test]
    fn issue_generates_unique_jti_and_fixed_ttl() -> Result<(), Error> {
        let signer = SessionSigner::from_secret("test-secret");
        let profile = test_profile();

        let first = signer.issue(&profile, NOW)?;
        let second = signer.issue(&profile, NOW)?;

        assert_ne!(first.jti, second.jti);
        assert_eq!(first.expires_at, NOW + SESSION_TTL_SECONDS);

        let claims = signer.verify(&first.token, NOW)?;
        assert_eq!(claims.sub, "subject-1");
        assert_eq!(claims.jti, first.jti);
        Ok(())
    }

    #[test]
    fn missing_secret_is_fatal_in_production() {
        let globals = GlobalArgs::new(
            "client-id".to_string(),
            "https://auth.scholatron.app".to_string(),
        );
        assert!(globals.environment.is_production());

        let result = SessionSigner::from_globals(&globals);
        assert!(matches!(
            result,
            Err(AuthError::SigningConfiguration(_))
        ));
    }

    #[test]
    fn empty_secret_is_fatal_in_production() {
        let mut globals = GlobalArgs::new(
            "client-id".to_string(),
            "https://auth.scholatron.app".to_string(),
        );
        globals.set_session_secret(Some(SecretString::from(String::new())));

        let result = SessionSigner::from_globals(&globals);
        assert!(matches!(
            result,
            Err(AuthError::SigningConfiguration(_))
        ));
    }

    #[test]
    fn missing_secret_gets_random_fallback_in_development() -> anyhow::Result<()> {
        let mut globals = GlobalArgs::new(
            "client-id".to_string(),
            "https://auth.scholatron.app".to_string(),
        );
        globals.environment = Environment::Development;

        let signer = SessionSigner::from_globals(&globals)
            .map_err(|err| anyhow::anyhow!("expected dev fallback: {err}"))?;
        let issued = signer.issue(&test_profile(), NOW)?;
        assert!(signer.verify(&issued.token, NOW).is_ok());
        Ok(())
    }
}
