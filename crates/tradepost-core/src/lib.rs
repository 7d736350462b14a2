//! tradepost-core - session management for the tradepost marketplace client.
//!
//! This crate owns the signed-in user's session: signing in and out,
//! persisting credentials, restoring them on startup, and signing out
//! automatically when the API rejects the session token.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tradepost_core::{ApiClient, AuthSession, MemoryStore};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let api = ApiClient::new("http://localhost:3333")?;
//! let session = AuthSession::new(api, Arc::new(MemoryStore::new()));
//!
//! if session.restore_session().await.is_none() {
//!     session.sign_in("ana@example.com", "secret").await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod storage;

pub use api::{ApiClient, ApiError, AuthFailureListener, AuthFailureSubscription};
pub use auth::{
    AuthSession, CredentialStore, ProfilePersistError, ProfileUpdateError, SessionError,
    SessionSnapshot, SessionStatus, SignIn, SignInError,
};
pub use config::{Config, StorageBackend};
pub use models::{AvatarUpload, ProfileChanges, TokenPair, UserProfile};
pub use storage::{FileStore, KeyValueStore, KeyringStore, MemoryStore, StorageError};
