//! Route gating and text rendering for the login and dashboard screens.
//!
//! SYSTEM CONTEXT
//! ==============
//! The dashboard is only reachable with an authenticated session; any other
//! state is redirected to the login screen. Rendering is plain text so the
//! CLI can print it directly.

use std::fmt;

use crate::session::SessionState;
use crate::types::UserProfile;

#[cfg(test)]
#[path = "views_test.rs"]
mod views_test;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
}

impl Route {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Dashboard => "/dashboard",
        }
    }

    /// Match a request path, tolerating a trailing slash. Unknown paths yield `None`.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        let trimmed = path.trim();
        let normalized = if trimmed.len() > 1 { trimmed.trim_end_matches('/') } else { trimmed };
        match normalized {
            "/login" => Some(Self::Login),
            "/dashboard" => Some(Self::Dashboard),
            _ => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Route actually shown for `requested` given the session state.
#[must_use]
pub fn resolve(requested: Route, state: &SessionState) -> Route {
    match (requested, state) {
        (Route::Dashboard, SessionState::Authenticated(_)) => Route::Dashboard,
        (Route::Dashboard, SessionState::Anonymous | SessionState::Authenticating) | (Route::Login, _) => {
            Route::Login
        }
    }
}

/// Navigation links shown above every screen.
#[must_use]
pub fn render_nav() -> String {
    format!("[{}] Login | [{}] Dashboard", Route::Login, Route::Dashboard)
}

#[must_use]
pub fn render_login() -> String {
    format!("{}\n\nLogin\nUsername: \nPassword: ", render_nav())
}

#[must_use]
pub fn render_dashboard(user: &UserProfile) -> String {
    format!("{}\n\nWelcome, {}\n(run `authdash logout` to sign out)", render_nav(), user.username)
}

/// Render whatever screen `requested` resolves to.
#[must_use]
pub fn render(requested: Route, state: &SessionState) -> String {
    match (resolve(requested, state), state.user()) {
        (Route::Dashboard, Some(user)) => render_dashboard(user),
        _ => render_login(),
    }
}
