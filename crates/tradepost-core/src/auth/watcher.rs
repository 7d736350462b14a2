//! Forced sign-out when the server rejects the session token.

use std::sync::Weak;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::api::AuthFailureListener;

use super::session::{AuthSession, SessionInner};

/// Listener registered on the API client by each `AuthSession`.
///
/// Holds only a weak reference: once the session is gone the listener does
/// nothing, and the session's own teardown unregisters it.
pub(super) struct ForcedLogoutWatcher {
    session: Weak<SessionInner>,
}

impl ForcedLogoutWatcher {
    pub(super) fn new(session: Weak<SessionInner>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl AuthFailureListener for ForcedLogoutWatcher {
    async fn on_auth_failure(&self) {
        let Some(inner) = self.session.upgrade() else {
            debug!("Session already torn down, ignoring auth failure");
            return;
        };

        warn!("Server rejected the session token, signing out");
        if let Err(e) = AuthSession::from_inner(inner).sign_out().await {
            warn!(error = %e, "Forced sign-out could not remove stored credentials");
        }
    }
}
