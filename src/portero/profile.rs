//! Canonical profile derived from a verified backend user.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use utoipa::ToSchema;

use crate::portero::backend::{BackendIdentity, BackendUser};

/// The linked-identity provider this service extracts a native id for.
pub const IDENTITY_PROVIDER: &str = "google";

pub const DEFAULT_ROLES: &[&str] = &["user"];
pub const DEFAULT_PERMISSIONS: &[&str] = &["read:profile", "update:profile"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    /// A linked identity for the provider exists but carries its native id in
    /// neither known shape. Guessing here would silently drop the provider
    /// link, so decoding fails instead.
    #[error("identity record for provider {0} has no usable id")]
    UnrecognizedIdentityShape(String),
}

/// Backend-agnostic user record embedded in session tokens and the
/// `user_data` cookie.
///
/// `subject_id` is the only field guaranteed present; it is the join key for
/// every downstream authorization decision. Everything else is best-effort.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct VerifiedProfile {
    pub subject_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl VerifiedProfile {
    /// Map a backend user into the canonical profile.
    ///
    /// Name precedence is fixed here once and for all: `full_name` wins over
    /// `name` for the display name, `user_name` wins over
    /// `preferred_username` for the username. Missing optional fields resolve
    /// to `None`, never to an error. The mapping is pure: the same backend
    /// user always yields a field-for-field identical profile.
    ///
    /// # Errors
    /// `UnrecognizedIdentityShape` when a provider identity entry exists but
    /// exposes its native id in neither supported shape.
    pub fn from_backend_user(user: &BackendUser) -> Result<Self, ProfileError> {
        let provider_id = match provider_identity(user) {
            Some(identity) => Some(native_id(identity)?),
            None => None,
        };

        let metadata = user.user_metadata.as_ref();

        Ok(Self {
            subject_id: user.id.clone(),
            provider_id,
            email: user.email.clone(),
            display_name: metadata_str(metadata, "full_name")
                .or_else(|| metadata_str(metadata, "name")),
            username: metadata_str(metadata, "user_name")
                .or_else(|| metadata_str(metadata, "preferred_username")),
            avatar_url: metadata_str(metadata, "avatar_url"),
            roles: DEFAULT_ROLES.iter().map(ToString::to_string).collect(),
            permissions: DEFAULT_PERMISSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
        })
    }
}

fn provider_identity(user: &BackendUser) -> Option<&BackendIdentity> {
    user.identities
        .as_deref()
        .unwrap_or_default()
        .iter()
        .find(|identity| identity.provider == IDENTITY_PROVIDER)
}

/// Decode the provider's native id from one of the two shapes the backend is
/// known to emit: a direct `provider_id` field, or `identity_data.id`.
fn native_id(identity: &BackendIdentity) -> Result<String, ProfileError> {
    if let Some(provider_id) = identity
        .provider_id
        .as_ref()
        .filter(|value| !value.is_empty())
    {
        return Ok(provider_id.clone());
    }

    if let Some(Value::String(id)) = identity
        .identity_data
        .as_ref()
        .and_then(|data| data.get("id"))
    {
        if !id.is_empty() {
            return Ok(id.clone());
        }
    }

    Err(ProfileError::UnrecognizedIdentityShape(
        identity.provider.clone(),
    ))
}

fn metadata_str(metadata: Option<&Map<String, Value>>, key: &str) -> Option<String> {
    match metadata?.get(key) {
        Some(Value::String(value)) if !value.is_empty() => Some(value.clone()),
        _ => None,
    }
}
