//! Session client for a JWT token-issuing auth gateway.
//!
//! ARCHITECTURE
//! ============
//! - [`store`]: persisted bearer token, scoped per gateway origin.
//! - [`gateway`]: credential exchange and current-user lookup over HTTP.
//! - [`session`]: login/logout/initialize state machine over the two above.
//! - [`views`]: route gating and text rendering of the login and dashboard screens.
//! - [`config`]: environment-driven configuration.

pub mod config;
pub mod gateway;
pub mod session;
pub mod store;
pub mod types;
pub mod views;

pub use gateway::{AuthGateway, GatewayError, HttpAuthGateway};
pub use session::{SessionController, SessionError, SessionState};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore, StoreError};
pub use types::{Credentials, Token, UserProfile};
