//! Session controller: login, logout and startup restore.
//!
//! SYSTEM CONTEXT
//! ==============
//! Composes an [`AuthGateway`] with a [`SessionStore`] and owns the in-memory
//! session state that views read to decide between the login and dashboard
//! routes. Both collaborators are injected at construction; there is no
//! ambient/global session.
//!
//! STATE MACHINE
//! =============
//! `Anonymous -> Authenticating -> Authenticated | Anonymous`, and `logout`
//! moves any state to `Anonymous`. `initialize` only ever moves
//! `Anonymous -> Authenticated` or leaves the state alone.
//!
//! CONCURRENCY
//! ===========
//! Operations are not serialized against each other. Concurrent `login` or
//! `login`/`initialize` calls race and the last one to finish decides the
//! state and the persisted token. In-flight requests cannot be cancelled, so
//! a response arriving after `logout` still applies. The state lock is only
//! held for reads and writes, never across an await.
//!
//! ERROR HANDLING
//! ==============
//! `login` collapses every failure into `false` after logging it;
//! `initialize` recovers silently by clearing the stored token. Callers that
//! want the typed reason use [`SessionController::try_login`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::gateway::{AuthGateway, GatewayError};
use crate::store::{SessionStore, StoreError};
use crate::types::{Credentials, UserProfile};

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

/// Current authentication state as seen by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated(UserProfile),
}

impl SessionState {
    #[must_use]
    pub fn user(&self) -> Option<&UserProfile> {
        match self {
            Self::Authenticated(profile) => Some(profile),
            Self::Anonymous | Self::Authenticating => None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("credential exchange failed: {0}")]
    Authentication(#[source] GatewayError),

    #[error("profile lookup after login failed: {0}")]
    ProfileFetch(#[source] GatewayError),

    #[error("stored token rejected at startup: {0}")]
    Initialization(#[source] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Owns the session lifecycle for one client.
pub struct SessionController<S, G> {
    store: S,
    gateway: G,
    state: Mutex<SessionState>,
}

impl<S: SessionStore, G: AuthGateway> SessionController<S, G> {
    /// New controller in the `Anonymous` state. Call [`Self::initialize`] once at startup.
    #[must_use]
    pub fn new(store: S, gateway: G) -> Self {
        Self { store, gateway, state: Mutex::new(SessionState::Anonymous) }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: SessionState) {
        *self.lock_state() = next;
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lock_state().clone()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<UserProfile> {
        self.lock_state().user().cloned()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.lock_state().is_authenticated()
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Restore a session from the persisted token.
    ///
    /// Without a stored token this makes no network call. A token the
    /// gateway rejects is removed from the store.
    pub async fn initialize(&self) -> SessionState {
        let Some(token) = self.store.get() else {
            tracing::debug!("no stored token; staying anonymous");
            return self.state();
        };

        match self.gateway.fetch_current_user(&token).await {
            Ok(profile) => {
                tracing::info!(username = %profile.username, "session restored");
                self.set_state(SessionState::Authenticated(profile));
            }
            Err(e) => {
                let err = SessionError::Initialization(e);
                tracing::warn!(error = %err, "discarding stored token");
                if let Err(e) = self.store.clear() {
                    tracing::warn!(error = %e, "failed to clear stored token");
                }
                self.set_state(SessionState::Anonymous);
            }
        }
        self.state()
    }

    /// Log in and report success as a boolean. Failures are logged, not returned.
    pub async fn login(&self, username: &str, password: &str) -> bool {
        match self.try_login(username, password).await {
            Ok(profile) => {
                tracing::info!(username = %profile.username, "login succeeded");
                true
            }
            Err(e) => {
                tracing::warn!(username, error = %e, "login failed");
                false
            }
        }
    }

    /// Log in, returning the profile or the typed failure.
    ///
    /// Login is atomic: if the profile lookup fails after the token was
    /// issued, the token is removed again before returning.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Authentication`] if the credentials are
    /// rejected, [`SessionError::ProfileFetch`] if the issued token cannot be
    /// resolved to a profile, or [`SessionError::Store`] if the token cannot
    /// be persisted.
    pub async fn try_login(&self, username: &str, password: &str) -> Result<UserProfile, SessionError> {
        self.set_state(SessionState::Authenticating);
        let credentials = Credentials::new(username, password);

        let token = match self.gateway.exchange_credentials(&credentials).await {
            Ok(token) => token,
            Err(e) => {
                self.set_state(SessionState::Anonymous);
                return Err(SessionError::Authentication(e));
            }
        };

        if let Err(e) = self.store.set(&token) {
            self.set_state(SessionState::Anonymous);
            return Err(e.into());
        }

        match self.gateway.fetch_current_user(&token).await {
            Ok(profile) => {
                self.set_state(SessionState::Authenticated(profile.clone()));
                Ok(profile)
            }
            Err(e) => {
                // A concurrent login may have replaced the token; only roll back our own.
                if self.store.get().as_ref() == Some(&token) {
                    if let Err(clear_err) = self.store.clear() {
                        tracing::warn!(error = %clear_err, "failed to roll back token");
                    }
                }
                self.set_state(SessionState::Anonymous);
                Err(SessionError::ProfileFetch(e))
            }
        }
    }

    /// Drop the session. Always succeeds from the caller's point of view.
    pub fn logout(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "failed to clear stored token on logout");
        }
        self.set_state(SessionState::Anonymous);
        tracing::info!("logged out");
    }
}
