use super::*;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::store::MemorySessionStore;
use crate::types::Token;

// =============================================================================
// MOCK GATEWAY
// =============================================================================

#[derive(Default)]
struct MockGateway {
    accounts: HashMap<(String, String), String>,
    profiles: HashMap<String, String>,
    exchange_calls: Mutex<Vec<String>>,
    profile_calls: Mutex<Vec<String>>,
    exchange_gates: HashMap<String, Arc<Notify>>,
    profile_gates: HashMap<String, Arc<Notify>>,
}

impl MockGateway {
    fn new() -> Self {
        Self::default()
    }

    fn with_account(mut self, username: &str, password: &str, token: &str) -> Self {
        self.accounts
            .insert((username.to_owned(), password.to_owned()), token.to_owned());
        self
    }

    fn with_profile(mut self, token: &str, username: &str) -> Self {
        self.profiles.insert(token.to_owned(), username.to_owned());
        self
    }

    /// Hold `username`'s credential exchange until `gate` is notified.
    fn gate_exchange(mut self, username: &str, gate: Arc<Notify>) -> Self {
        self.exchange_gates.insert(username.to_owned(), gate);
        self
    }

    /// Hold the profile lookup for `token` until `gate` is notified.
    fn gate_profile(mut self, token: &str, gate: Arc<Notify>) -> Self {
        self.profile_gates.insert(token.to_owned(), gate);
        self
    }

    fn exchange_count(&self) -> usize {
        self.exchange_calls.lock().unwrap().len()
    }

    fn exchange_calls(&self) -> Vec<String> {
        self.exchange_calls.lock().unwrap().clone()
    }

    fn profile_calls(&self) -> Vec<String> {
        self.profile_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthGateway for MockGateway {
    async fn exchange_credentials(&self, credentials: &Credentials) -> Result<Token, GatewayError> {
        self.exchange_calls
            .lock()
            .unwrap()
            .push(credentials.username.clone());
        if let Some(gate) = self.exchange_gates.get(&credentials.username) {
            gate.notified().await;
        }
        self.accounts
            .get(&(credentials.username.clone(), credentials.password.clone()))
            .map(|t| Token::new(t.clone()))
            .ok_or_else(|| GatewayError::Authentication("status 401".into()))
    }

    async fn fetch_current_user(&self, token: &Token) -> Result<UserProfile, GatewayError> {
        self.profile_calls
            .lock()
            .unwrap()
            .push(token.as_str().to_owned());
        if let Some(gate) = self.profile_gates.get(token.as_str()) {
            gate.notified().await;
        }
        self.profiles
            .get(token.as_str())
            .map(|username| UserProfile { username: username.clone(), id: None, email: None })
            .ok_or_else(|| GatewayError::ProfileFetch("status 401".into()))
    }
}

fn alice_gateway() -> Arc<MockGateway> {
    Arc::new(
        MockGateway::new()
            .with_account("alice", "correct-pw", "tok1")
            .with_profile("tok1", "alice"),
    )
}

/// Yield to spawned tasks until `cond` holds.
async fn wait_until(cond: impl Fn() -> bool) {
    while !cond() {
        tokio::task::yield_now().await;
    }
}

fn controller(
    store: MemorySessionStore,
    gateway: &Arc<MockGateway>,
) -> SessionController<Arc<MemorySessionStore>, Arc<MockGateway>> {
    SessionController::new(Arc::new(store), Arc::clone(gateway))
}

// =============================================================================
// initialize
// =============================================================================

#[tokio::test]
async fn initialize_without_token_makes_no_network_call() {
    let gateway = alice_gateway();
    let ctl = controller(MemorySessionStore::new(), &gateway);

    let state = ctl.initialize().await;

    assert_eq!(state, SessionState::Anonymous);
    assert!(gateway.profile_calls().is_empty());
    assert_eq!(gateway.exchange_count(), 0);
}

#[tokio::test]
async fn initialize_with_valid_token_restores_user() {
    let gateway = alice_gateway();
    let ctl = controller(MemorySessionStore::with_token("tok1"), &gateway);

    ctl.initialize().await;

    assert_eq!(ctl.current_user().map(|u| u.username), Some("alice".to_owned()));
    assert_eq!(gateway.profile_calls(), vec!["tok1".to_owned()]);
    assert_eq!(ctl.store().get(), Some(Token::new("tok1")));
}

#[tokio::test]
async fn initialize_with_rejected_token_clears_store() {
    let gateway = alice_gateway();
    let ctl = controller(MemorySessionStore::with_token("abc123"), &gateway);

    let state = ctl.initialize().await;

    assert_eq!(state, SessionState::Anonymous);
    assert!(ctl.store().get().is_none());
}

// =============================================================================
// login
// =============================================================================

#[tokio::test]
async fn login_valid_credentials_authenticates_and_persists_token() {
    let gateway = alice_gateway();
    let ctl = controller(MemorySessionStore::new(), &gateway);

    assert!(ctl.login("alice", "correct-pw").await);

    assert!(ctl.is_authenticated());
    assert_eq!(ctl.current_user().unwrap().username, "alice");
    assert_eq!(ctl.store().get(), Some(Token::new("tok1")));
}

#[tokio::test]
async fn login_invalid_credentials_stays_anonymous_without_token() {
    let gateway = alice_gateway();
    let ctl = controller(MemorySessionStore::new(), &gateway);

    assert!(!ctl.login("alice", "wrong").await);

    assert_eq!(ctl.state(), SessionState::Anonymous);
    assert!(ctl.store().get().is_none());
    assert!(gateway.profile_calls().is_empty());
}

#[tokio::test]
async fn try_login_reports_authentication_error() {
    let gateway = alice_gateway();
    let ctl = controller(MemorySessionStore::new(), &gateway);

    let err = ctl.try_login("bob", "pw").await.unwrap_err();
    assert!(matches!(err, SessionError::Authentication(_)));
}

#[tokio::test]
async fn login_profile_failure_rolls_back_token() {
    let gateway = Arc::new(MockGateway::new().with_account("carol", "pw", "orphan"));
    let ctl = controller(MemorySessionStore::new(), &gateway);

    let err = ctl.try_login("carol", "pw").await.unwrap_err();

    assert!(matches!(err, SessionError::ProfileFetch(_)));
    assert_eq!(ctl.state(), SessionState::Anonymous);
    assert!(ctl.store().get().is_none());
    assert_eq!(gateway.profile_calls(), vec!["orphan".to_owned()]);
}

#[tokio::test]
async fn login_is_authenticating_while_exchange_in_flight() {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(
        MockGateway::new()
            .with_account("alice", "correct-pw", "tok1")
            .with_profile("tok1", "alice")
            .gate_exchange("alice", Arc::clone(&gate)),
    );
    let ctl = Arc::new(controller(MemorySessionStore::new(), &gateway));

    let task = tokio::spawn({
        let ctl = Arc::clone(&ctl);
        async move { ctl.login("alice", "correct-pw").await }
    });
    while gateway.exchange_count() == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(ctl.state(), SessionState::Authenticating);

    gate.notify_one();
    assert!(task.await.unwrap());
    assert!(ctl.is_authenticated());
}

#[tokio::test]
async fn stale_login_response_after_logout_still_applies() {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(
        MockGateway::new()
            .with_account("alice", "correct-pw", "tok1")
            .with_profile("tok1", "alice")
            .gate_exchange("alice", Arc::clone(&gate)),
    );
    let ctl = Arc::new(controller(MemorySessionStore::new(), &gateway));

    let task = tokio::spawn({
        let ctl = Arc::clone(&ctl);
        async move { ctl.login("alice", "correct-pw").await }
    });
    while gateway.exchange_count() == 0 {
        tokio::task::yield_now().await;
    }
    ctl.logout();
    assert_eq!(ctl.state(), SessionState::Anonymous);

    gate.notify_one();
    assert!(task.await.unwrap());
    assert!(ctl.is_authenticated());
    assert_eq!(ctl.store().get(), Some(Token::new("tok1")));
}

// =============================================================================
// concurrent operations: last to finish wins
// =============================================================================

fn alice_and_bob_gateway() -> MockGateway {
    MockGateway::new()
        .with_account("alice", "correct-pw", "tok-a")
        .with_profile("tok-a", "alice")
        .with_account("bob", "bob-pw", "tok-b")
}

#[tokio::test]
async fn concurrent_logins_later_finisher_sets_state_and_token() {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(
        alice_and_bob_gateway()
            .with_profile("tok-b", "bob")
            .gate_exchange("alice", Arc::clone(&gate)),
    );
    let ctl = Arc::new(controller(MemorySessionStore::new(), &gateway));

    let alice = tokio::spawn({
        let ctl = Arc::clone(&ctl);
        async move { ctl.login("alice", "correct-pw").await }
    });
    wait_until(|| gateway.exchange_calls().contains(&"alice".to_owned())).await;

    assert!(ctl.login("bob", "bob-pw").await);
    assert_eq!(ctl.current_user().unwrap().username, "bob");

    gate.notify_one();
    assert!(alice.await.unwrap());
    assert_eq!(ctl.current_user().unwrap().username, "alice");
    assert_eq!(ctl.store().get(), Some(Token::new("tok-a")));
}

#[tokio::test]
async fn failing_login_finishing_last_leaves_anonymous_without_token() {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(alice_and_bob_gateway().gate_exchange("bob", Arc::clone(&gate)));
    let ctl = Arc::new(controller(MemorySessionStore::new(), &gateway));

    let bob = tokio::spawn({
        let ctl = Arc::clone(&ctl);
        async move { ctl.login("bob", "bob-pw").await }
    });
    wait_until(|| gateway.exchange_calls().contains(&"bob".to_owned())).await;

    assert!(ctl.login("alice", "correct-pw").await);

    gate.notify_one();
    // bob's token is issued and persisted, his profile lookup fails, and he rolls back his own token.
    assert!(!bob.await.unwrap());
    assert_eq!(ctl.state(), SessionState::Anonymous);
    assert!(ctl.store().get().is_none());
}

#[tokio::test]
async fn rollback_keeps_token_written_by_newer_login() {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(alice_and_bob_gateway().gate_profile("tok-b", Arc::clone(&gate)));
    let ctl = Arc::new(controller(MemorySessionStore::new(), &gateway));

    let bob = tokio::spawn({
        let ctl = Arc::clone(&ctl);
        async move { ctl.try_login("bob", "bob-pw").await }
    });
    wait_until(|| gateway.profile_calls().contains(&"tok-b".to_owned())).await;
    assert_eq!(ctl.store().get(), Some(Token::new("tok-b")));

    assert!(ctl.login("alice", "correct-pw").await);
    assert_eq!(ctl.store().get(), Some(Token::new("tok-a")));

    gate.notify_one();
    let err = bob.await.unwrap().unwrap_err();
    assert!(matches!(err, SessionError::ProfileFetch(_)));
    assert_eq!(ctl.store().get(), Some(Token::new("tok-a")));
    assert_eq!(ctl.state(), SessionState::Anonymous);
}

#[tokio::test]
async fn failing_initialize_finishing_after_login_clears_store() {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(alice_and_bob_gateway().gate_profile("stale", Arc::clone(&gate)));
    let ctl = Arc::new(controller(MemorySessionStore::with_token("stale"), &gateway));

    let init = tokio::spawn({
        let ctl = Arc::clone(&ctl);
        async move { ctl.initialize().await }
    });
    wait_until(|| gateway.profile_calls().contains(&"stale".to_owned())).await;

    assert!(ctl.login("alice", "correct-pw").await);
    assert!(ctl.is_authenticated());

    gate.notify_one();
    assert_eq!(init.await.unwrap(), SessionState::Anonymous);
    assert!(ctl.store().get().is_none());
}

#[tokio::test]
async fn successful_initialize_finishing_after_failed_login_restores_user() {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(alice_and_bob_gateway().gate_profile("tok-a", Arc::clone(&gate)));
    let ctl = Arc::new(controller(MemorySessionStore::with_token("tok-a"), &gateway));

    let init = tokio::spawn({
        let ctl = Arc::clone(&ctl);
        async move { ctl.initialize().await }
    });
    wait_until(|| gateway.profile_calls().contains(&"tok-a".to_owned())).await;

    assert!(!ctl.login("alice", "wrong").await);
    assert_eq!(ctl.state(), SessionState::Anonymous);

    gate.notify_one();
    let state = init.await.unwrap();
    assert_eq!(state.user().map(|u| u.username.as_str()), Some("alice"));
    assert_eq!(ctl.store().get(), Some(Token::new("tok-a")));
}

// =============================================================================
// logout
// =============================================================================

#[tokio::test]
async fn logout_from_authenticated_clears_everything() {
    let gateway = alice_gateway();
    let ctl = controller(MemorySessionStore::new(), &gateway);
    assert!(ctl.login("alice", "correct-pw").await);

    ctl.logout();

    assert_eq!(ctl.state(), SessionState::Anonymous);
    assert!(ctl.current_user().is_none());
    assert!(ctl.store().get().is_none());
}

#[test]
fn logout_from_anonymous_clears_leftover_token() {
    let gateway = alice_gateway();
    let ctl = controller(MemorySessionStore::with_token("leftover"), &gateway);

    ctl.logout();

    assert_eq!(ctl.state(), SessionState::Anonymous);
    assert!(ctl.store().get().is_none());
}

#[tokio::test]
async fn login_logout_initialize_resets_to_anonymous() {
    let gateway = alice_gateway();
    let ctl = controller(MemorySessionStore::new(), &gateway);

    assert!(ctl.login("alice", "correct-pw").await);
    ctl.logout();
    let state = ctl.initialize().await;

    assert_eq!(state, SessionState::Anonymous);
    assert!(ctl.store().get().is_none());
    // Only the profile lookup from login; initialize had nothing to resolve.
    assert_eq!(gateway.profile_calls().len(), 1);
}

// =============================================================================
// SessionState
// =============================================================================

#[test]
fn session_state_user_only_when_authenticated() {
    let profile = UserProfile { username: "alice".into(), id: Some(1), email: None };
    assert!(SessionState::Anonymous.user().is_none());
    assert!(SessionState::Authenticating.user().is_none());
    assert_eq!(SessionState::Authenticated(profile.clone()).user(), Some(&profile));
    assert_eq!(SessionState::default(), SessionState::Anonymous);
}
