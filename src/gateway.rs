//! HTTP client for the token-issuing auth gateway.
//!
//! ENDPOINTS
//! =========
//! - `POST {base}/auth/jwt/create/` with `{"username","password"}` -> `{"access", ...}`
//! - `GET {base}/auth/users/me/` with `Authorization: Bearer <token>` -> profile
//!
//! Any non-2xx status, transport failure, or body that does not match the
//! expected shape is an error. Nothing here reads or writes the session store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use crate::types::{Credentials, Token, TokenPair, UserProfile};

#[cfg(test)]
#[path = "gateway_test.rs"]
mod gateway_test;

pub const TOKEN_CREATE_PATH: &str = "/auth/jwt/create/";
pub const CURRENT_USER_PATH: &str = "/auth/users/me/";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Credential exchange was rejected or could not be completed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Profile lookup was rejected, unreachable, or returned a malformed body.
    #[error("profile fetch failed: {0}")]
    ProfileFetch(String),

    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),
}

/// Remote operations the session controller depends on.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Exchange a username/password pair for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Authentication`] on any non-2xx status,
    /// transport failure, or a response without an `access` token.
    async fn exchange_credentials(&self, credentials: &Credentials) -> Result<Token, GatewayError>;

    /// Look up the profile the token belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ProfileFetch`] on any non-2xx status,
    /// transport failure, or a body that fails profile validation.
    async fn fetch_current_user(&self, token: &Token) -> Result<UserProfile, GatewayError>;
}

/// `reqwest`-backed gateway client.
#[derive(Debug, Clone)]
pub struct HttpAuthGateway {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAuthGateway {
    /// Build a client rooted at `base_url`. `timeout` of `None` leaves requests unbounded.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ClientBuild`] if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, GatewayError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| GatewayError::ClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl AuthGateway for HttpAuthGateway {
    async fn exchange_credentials(&self, credentials: &Credentials) -> Result<Token, GatewayError> {
        let response = self
            .http
            .post(self.url(TOKEN_CREATE_PATH))
            .json(credentials)
            .send()
            .await
            .map_err(|e| GatewayError::Authentication(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Authentication(format!("status {}", status.as_u16())));
        }
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Authentication(e.to_string()))?;
        let pair: TokenPair = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Authentication(format!("malformed token response: {e}")))?;
        Ok(Token::new(pair.access))
    }

    async fn fetch_current_user(&self, token: &Token) -> Result<UserProfile, GatewayError> {
        let response = self
            .http
            .get(self.url(CURRENT_USER_PATH))
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(token.as_str())
            .send()
            .await
            .map_err(|e| GatewayError::ProfileFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::ProfileFetch(format!("status {}", status.as_u16())));
        }
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::ProfileFetch(e.to_string()))?;
        UserProfile::from_json(&text).map_err(|e| GatewayError::ProfileFetch(e.to_string()))
    }
}

#[async_trait]
impl<T: AuthGateway + ?Sized> AuthGateway for std::sync::Arc<T> {
    async fn exchange_credentials(&self, credentials: &Credentials) -> Result<Token, GatewayError> {
        (**self).exchange_credentials(credentials).await
    }

    async fn fetch_current_user(&self, token: &Token) -> Result<UserProfile, GatewayError> {
        (**self).fetch_current_user(token).await
    }
}
