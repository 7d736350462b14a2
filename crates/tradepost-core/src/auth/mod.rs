//! Authentication module for managing the user's session.
//!
//! This module provides:
//! - `AuthSession`: sign-in, sign-up, restoration, profile updates, sign-out
//! - `SessionState`: the observable "current user" and loading flag
//! - `CredentialStore`: the persisted profile and token pair
//!
//! A `401` on any authorized request signs the session out automatically.

pub mod credentials;
pub mod error;
pub mod session;
pub mod state;
mod watcher;

pub use credentials::{CredentialStore, TOKEN_STORAGE_KEY, USER_STORAGE_KEY};
pub use error::{ProfilePersistError, ProfileUpdateError, SessionError, SignInError};
pub use session::{AuthSession, SignIn};
pub use state::{SessionSnapshot, SessionState, SessionStatus};
