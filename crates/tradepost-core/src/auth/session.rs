//! The session lifecycle: sign-in, restoration, profile updates, sign-out.
//!
//! `AuthSession` is constructed explicitly and handed to whatever needs the
//! current user. Clones share one underlying session. When the last clone is
//! dropped (or `shutdown` is called) the forced-logout subscription on the
//! API client is removed.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, AuthFailureSubscription};
use crate::models::{AvatarUpload, ProfileChanges, UserProfile};
use crate::storage::{KeyValueStore, StorageError};

use super::credentials::CredentialStore;
use super::error::{ProfilePersistError, ProfileUpdateError, SessionError, SignInError};
use super::state::{SessionSnapshot, SessionState, SessionStatus};
use super::watcher::ForcedLogoutWatcher;

/// Result of a successful sign-in.
#[derive(Debug)]
pub struct SignIn {
    pub user: UserProfile,
    /// Set when the credentials could not be persisted. The session is still
    /// active for this process but will not survive a restart.
    pub persist_error: Option<StorageError>,
}

impl SignIn {
    pub fn is_persisted(&self) -> bool {
        self.persist_error.is_none()
    }
}

pub(crate) struct SessionInner {
    api: ApiClient,
    state: SessionState,
    credentials: CredentialStore,
    watcher: Mutex<Option<AuthFailureSubscription>>,
}

#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<SessionInner>,
}

impl AuthSession {
    /// Create an empty (signed-out) session and start watching the API
    /// client for authorization failures.
    pub fn new(api: ApiClient, store: Arc<dyn KeyValueStore>) -> Self {
        let inner = Arc::new(SessionInner {
            state: SessionState::new(api.clone()),
            credentials: CredentialStore::new(store),
            api,
            watcher: Mutex::new(None),
        });
        let session = Self { inner };
        session.watch_auth_failures();
        session
    }

    pub(super) fn from_inner(inner: Arc<SessionInner>) -> Self {
        Self { inner }
    }

    // =========================================================================
    // Observation
    // =========================================================================

    pub fn current_user(&self) -> Option<UserProfile> {
        self.inner.state.current_user()
    }

    /// True while sign-in, sign-up, sign-out or restoration runs. Advisory:
    /// callers should not start another sign-in while this is set, but
    /// nothing here enforces it.
    pub fn is_loading(&self) -> bool {
        self.inner.state.is_loading()
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.state.status()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    // =========================================================================
    // Forced logout wiring
    // =========================================================================

    /// (Re)register the forced-logout listener. Any previous registration for
    /// this session is removed first.
    pub fn watch_auth_failures(&self) {
        let mut slot = self.lock_watcher();
        slot.take();
        let watcher = ForcedLogoutWatcher::new(Arc::downgrade(&self.inner));
        *slot = Some(self.inner.api.on_auth_failure(Arc::new(watcher)));
    }

    pub fn is_watching(&self) -> bool {
        self.lock_watcher().is_some()
    }

    /// Stop reacting to authorization failures. Also happens on drop.
    pub fn shutdown(&self) {
        if self.lock_watcher().take().is_some() {
            debug!("Forced-logout watcher removed");
        }
    }

    fn lock_watcher(&self) -> std::sync::MutexGuard<'_, Option<AuthFailureSubscription>> {
        self.inner.watcher.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// Credentials are written to the store before the session becomes
    /// visible. A storage failure does not undo the sign-in; it is reported
    /// in `SignIn::persist_error`.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignIn, SignInError> {
        let _loading = self.inner.state.begin_loading();
        info!("Signing in");

        let response = self
            .inner
            .api
            .create_session(email, password)
            .await
            .map_err(|e| {
                warn!(error = %e, "Sign-in failed");
                SignInError::from_api(e)
            })?;

        let (user, tokens) = response.into_parts().ok_or_else(|| {
            warn!("Sign-in response is missing the user or tokens");
            SignInError::MalformedResponse
        })?;

        let persist_error = self.inner.credentials.save_session(&user, &tokens).await.err();
        self.inner.state.set_user(user.clone(), &tokens);

        info!(user_id = %user.id, persisted = persist_error.is_none(), "Sign-in successful");
        Ok(SignIn { user, persist_error })
    }

    /// Create an account, then sign in with the same credentials.
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> Result<SignIn, SignInError> {
        let _loading = self.inner.state.begin_loading();
        info!("Creating account");

        self.inner
            .api
            .register_user(name, email, password)
            .await
            .map_err(|e| {
                warn!(error = %e, "Sign-up failed");
                SignInError::from_api(e)
            })?;

        self.sign_in(email, password).await
    }

    /// Restore the session saved by a previous process.
    ///
    /// Never fails: missing, partial, corrupt or unreadable credentials all
    /// leave the session signed out.
    pub async fn restore_session(&self) -> Option<UserProfile> {
        if let Some(user) = self.current_user() {
            debug!("Session already active, skipping restore");
            return Some(user);
        }

        let _loading = self.inner.state.begin_loading();
        self.inner.state.set_status(SessionStatus::Restoring);

        match self.inner.credentials.load_session().await {
            Some((user, tokens)) => {
                self.inner.state.set_user(user.clone(), &tokens);
                info!(user_id = %user.id, "Session restored");
                Some(user)
            }
            None => {
                self.inner.state.set_status(SessionStatus::Unauthenticated);
                debug!("No stored session to restore");
                None
            }
        }
    }

    /// Replace the current profile locally and persist it. No remote call.
    ///
    /// On a storage failure the in-memory profile is still updated.
    pub async fn update_profile(&self, profile: UserProfile) -> Result<(), ProfilePersistError> {
        if !self.inner.state.replace_user(profile.clone()) {
            return Err(ProfilePersistError::NotAuthenticated);
        }

        self.inner.credentials.save_user(&profile).await.map_err(|e| {
            warn!(error = %e, "Profile updated in memory but not persisted");
            ProfilePersistError::from(e)
        })
    }

    /// Sign out: clear the in-memory session and bearer token, then remove
    /// both stored records. Safe to call with no active session.
    ///
    /// The in-memory session is always cleared; a storage error only means a
    /// stale record may remain on disk.
    pub async fn sign_out(&self) -> Result<(), StorageError> {
        let _loading = self.inner.state.begin_loading();
        let had_session = self.inner.state.current_user().is_some();

        self.inner.state.set_status(SessionStatus::TransitioningOut);
        self.inner.state.clear();
        let result = self.inner.credentials.clear().await;
        self.inner.state.set_status(SessionStatus::Unauthenticated);

        info!(had_session, "Signed out");
        result
    }

    // =========================================================================
    // Remote profile changes
    // =========================================================================

    /// Send name/password changes to the server, then apply the new name locally.
    pub async fn save_profile_changes(&self, changes: ProfileChanges) -> Result<UserProfile, ProfileUpdateError> {
        let mut updated = self.current_user().ok_or(ProfileUpdateError::NotAuthenticated)?;

        self.inner.api.update_user(&changes).await?;

        updated.name = changes.name;
        self.update_profile(updated.clone()).await?;
        info!(user_id = %updated.id, "Profile updated");
        Ok(updated)
    }

    /// Upload a new avatar, then store the returned reference on the profile.
    pub async fn change_avatar(&self, upload: AvatarUpload) -> Result<UserProfile, ProfileUpdateError> {
        if upload.exceeds_limit() {
            return Err(ProfileUpdateError::avatar_too_large(upload.size()));
        }
        let mut updated = self.current_user().ok_or(ProfileUpdateError::NotAuthenticated)?;

        let avatar = self.inner.api.upload_avatar(&upload, &updated.name).await?;

        updated.avatar = Some(avatar);
        self.update_profile(updated.clone()).await?;
        info!(user_id = %updated.id, "Avatar updated");
        Ok(updated)
    }

    // =========================================================================
    // Token refresh
    // =========================================================================

    /// Trade the session's refresh token for a new pair, install it and
    /// persist it. A rejected refresh token signs the session out.
    ///
    /// The live pair is used, so a session whose credentials could not be
    /// persisted can still refresh. If the session is signed out or replaced
    /// while the request is in flight, the new pair is discarded.
    pub async fn refresh_session(&self) -> Result<(), SessionError> {
        let current = self.inner.state.tokens().ok_or(SessionError::NotAuthenticated)?;

        match self.inner.api.refresh_tokens(&current.refresh_token).await {
            Ok(tokens) => {
                if !self.inner.state.replace_tokens(&current, tokens.clone()) {
                    debug!("Session changed while refreshing, discarding refreshed tokens");
                    return Err(SessionError::NotAuthenticated);
                }
                if let Err(e) = self.inner.credentials.save_tokens(&tokens).await {
                    warn!(error = %e, "Refreshed tokens not persisted");
                }
                info!("Session tokens refreshed");
                Ok(())
            }
            Err(e) if e.is_unauthorized() => {
                // Only the session that owned the rejected token is torn down
                if self.inner.state.tokens().as_ref() != Some(&current) {
                    return Err(SessionError::NotAuthenticated);
                }
                warn!("Refresh token rejected, signing out");
                if let Err(e) = self.sign_out().await {
                    warn!(error = %e, "Sign-out after rejected refresh could not remove stored credentials");
                }
                Err(SessionError::Expired)
            }
            Err(e) => Err(SessionError::Remote(e)),
        }
    }
}
