//! Gateway-facing value types: tokens, credentials and the user profile.
//!
//! DESIGN
//! ======
//! The gateway returns loosely shaped JSON. Everything that crosses into the
//! session layer is converted to one of these typed values first, so the
//! controller never handles an untyped record.

use std::fmt;

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

// =============================================================================
// TOKEN
// =============================================================================

/// Opaque bearer credential issued by the gateway.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

// =============================================================================
// CREDENTIALS
// =============================================================================

/// Username/password pair sent as the credential-exchange request body.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// USER PROFILE
// =============================================================================

/// Authenticated identity as returned by `GET /auth/users/me/`.
///
/// Only `username` is required. Extra fields the gateway sends are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Reasons a profile body is rejected at the gateway boundary.
#[derive(Debug, thiserror::Error)]
pub enum ProfileSchemaError {
    #[error("profile body is not valid: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("profile username is empty")]
    EmptyUsername,
}

impl UserProfile {
    /// Parse and validate a raw profile response body.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileSchemaError`] if the body is not a JSON object with a
    /// non-empty string `username`.
    pub fn from_json(body: &str) -> Result<Self, ProfileSchemaError> {
        let profile: Self = serde_json::from_str(body)?;
        if profile.username.trim().is_empty() {
            return Err(ProfileSchemaError::EmptyUsername);
        }
        Ok(profile)
    }
}

// =============================================================================
// TOKEN RESPONSE
// =============================================================================

/// Body of a successful `POST /auth/jwt/create/`. `refresh` is accepted but unused.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenPair {
    pub access: String,
}
