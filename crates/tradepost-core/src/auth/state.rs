//! In-memory session state: who is signed in, and whether a session
//! operation is in flight.
//!
//! The snapshot lives in a `watch` channel so observers (UI, navigation)
//! can react to changes, and every write is sequenced through one sender.
//! Installing or clearing the user always updates the API client's bearer
//! token in the same synchronous step, so the two never diverge.

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::api::ApiClient;
use crate::models::{TokenPair, UserProfile};

/// Lifecycle phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Unauthenticated,
    /// Reading cached credentials at startup
    Restoring,
    Authenticated,
    /// Sign-out in progress (explicit or forced)
    TransitioningOut,
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    user: Option<UserProfile>,
    status: SessionStatus,
    in_flight: usize,
    authenticated_at: Option<DateTime<Utc>>,
    tokens: Option<TokenPair>,
}

impl SessionSnapshot {
    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// When the current session was established (sign-in or restore).
    pub fn authenticated_at(&self) -> Option<DateTime<Utc>> {
        self.authenticated_at
    }
}

pub struct SessionState {
    api: ApiClient,
    snapshot: watch::Sender<SessionSnapshot>,
}

impl SessionState {
    pub fn new(api: ApiClient) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::default());
        Self { api, snapshot }
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.snapshot.borrow().user.clone()
    }

    /// Token pair backing the active session, if any.
    pub(crate) fn tokens(&self) -> Option<TokenPair> {
        self.snapshot.borrow().tokens.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.snapshot.borrow().is_loading()
    }

    pub fn status(&self) -> SessionStatus {
        self.snapshot.borrow().status
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    /// Make `profile` the current user and install `Bearer <access_token>`.
    pub fn set_user(&self, profile: UserProfile, tokens: &TokenPair) {
        self.api.set_token(&tokens.access_token);
        self.snapshot.send_modify(|s| {
            s.user = Some(profile);
            s.tokens = Some(tokens.clone());
            s.status = SessionStatus::Authenticated;
            s.authenticated_at = Some(Utc::now());
        });
    }

    /// Overwrite the current profile. Returns false if nobody is signed in.
    pub fn replace_user(&self, profile: UserProfile) -> bool {
        self.snapshot.send_if_modified(|s| match s.user {
            Some(ref mut user) => {
                *user = profile;
                true
            }
            None => false,
        })
    }

    /// Replace `previous` with `tokens` and install the new bearer token.
    ///
    /// Returns false, leaving the session and header untouched, unless the
    /// active session still holds exactly `previous`. A sign-out or a new
    /// sign-in in the meantime makes `previous` stale.
    pub fn replace_tokens(&self, previous: &TokenPair, tokens: TokenPair) -> bool {
        self.snapshot.send_if_modified(|s| {
            if s.user.is_none() || s.tokens.as_ref() != Some(previous) {
                return false;
            }
            self.api.set_token(&tokens.access_token);
            s.tokens = Some(tokens);
            true
        })
    }

    /// Remove the current user and the bearer token.
    pub fn clear(&self) {
        self.api.clear_token();
        self.snapshot.send_modify(|s| {
            s.user = None;
            s.tokens = None;
            s.authenticated_at = None;
            if s.status != SessionStatus::TransitioningOut {
                s.status = SessionStatus::Unauthenticated;
            }
        });
    }

    pub(crate) fn set_status(&self, status: SessionStatus) {
        self.snapshot.send_if_modified(|s| {
            let changed = s.status != status;
            s.status = status;
            changed
        });
    }

    /// Mark a session operation as in flight until the guard is dropped.
    pub(crate) fn begin_loading(&self) -> LoadingGuard<'_> {
        self.snapshot.send_modify(|s| s.in_flight += 1);
        LoadingGuard { state: self }
    }
}

/// Clears the loading flag on every exit path, including early returns.
pub(crate) struct LoadingGuard<'a> {
    state: &'a SessionState,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state
            .snapshot
            .send_modify(|s| s.in_flight = s.in_flight.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SessionState {
        SessionState::new(ApiClient::new("http://localhost:3333").expect("client"))
    }

    fn tokens(access: &str) -> TokenPair {
        TokenPair::new(access, format!("r-{}", access))
    }

    #[test]
    fn test_set_user_installs_header() {
        let state = state();
        state.set_user(UserProfile::new("u1", "Ana", "ana@x.com"), &tokens("a1"));

        assert_eq!(state.current_user().map(|u| u.id), Some("u1".to_string()));
        assert_eq!(state.status(), SessionStatus::Authenticated);
        assert_eq!(state.api.authorization_header().as_deref(), Some("Bearer a1"));
        assert!(state.snapshot().authenticated_at().is_some());
    }

    #[test]
    fn test_clear_removes_user_and_header() {
        let state = state();
        state.set_user(UserProfile::new("u1", "Ana", "ana@x.com"), &tokens("a1"));
        state.clear();

        assert_eq!(state.current_user(), None);
        assert_eq!(state.tokens(), None);
        assert_eq!(state.status(), SessionStatus::Unauthenticated);
        assert_eq!(state.api.authorization_header(), None);
    }

    #[test]
    fn test_clear_keeps_transitioning_status() {
        let state = state();
        state.set_user(UserProfile::new("u1", "Ana", "ana@x.com"), &tokens("a1"));
        state.set_status(SessionStatus::TransitioningOut);
        state.clear();
        assert_eq!(state.status(), SessionStatus::TransitioningOut);
    }

    #[test]
    fn test_replace_user_requires_session() {
        let state = state();
        assert!(!state.replace_user(UserProfile::new("u1", "Ana", "ana@x.com")));
        assert_eq!(state.current_user(), None);

        state.set_user(UserProfile::new("u1", "Ana", "ana@x.com"), &tokens("a1"));
        assert!(state.replace_user(UserProfile::new("u1", "Ana Souza", "ana@x.com")));
        assert_eq!(state.current_user().map(|u| u.name), Some("Ana Souza".to_string()));
        assert_eq!(state.api.authorization_header().as_deref(), Some("Bearer a1"));
    }

    #[test]
    fn test_replace_tokens_requires_session() {
        let state = state();
        assert!(!state.replace_tokens(&tokens("a1"), tokens("a2")));
        assert_eq!(state.api.authorization_header(), None);

        state.set_user(UserProfile::new("u1", "Ana", "ana@x.com"), &tokens("a1"));
        assert!(state.replace_tokens(&tokens("a1"), tokens("a2")));
        assert_eq!(state.api.authorization_header().as_deref(), Some("Bearer a2"));
        assert_eq!(state.tokens(), Some(tokens("a2")));
    }

    #[test]
    fn test_replace_tokens_rejects_stale_pair() {
        let state = state();
        state.set_user(UserProfile::new("u1", "Ana", "ana@x.com"), &tokens("a1"));
        state.clear();
        state.set_user(UserProfile::new("u2", "Bia", "bia@x.com"), &tokens("b1"));

        assert!(!state.replace_tokens(&tokens("a1"), tokens("a2")));
        assert_eq!(state.api.authorization_header().as_deref(), Some("Bearer b1"));
        assert_eq!(state.tokens(), Some(tokens("b1")));
    }

    #[test]
    fn test_loading_guard_nests_and_resets() {
        let state = state();
        assert!(!state.is_loading());
        {
            let _outer = state.begin_loading();
            {
                let _inner = state.begin_loading();
                assert!(state.is_loading());
            }
            assert!(state.is_loading());
        }
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let state = state();
        let mut rx = state.subscribe();

        state.set_user(UserProfile::new("u1", "Ana", "ana@x.com"), &tokens("a1"));
        rx.changed().await.expect("sender alive");
        assert!(rx.borrow_and_update().is_authenticated());
    }
}
