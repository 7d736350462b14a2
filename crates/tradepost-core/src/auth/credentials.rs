//! Persisted session records: the user profile and the token pair.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::models::{TokenPair, UserProfile};
use crate::storage::{KeyValueStore, StorageError};

/// Storage key holding the JSON-serialized `UserProfile`
pub const USER_STORAGE_KEY: &str = "@tradepost:user";

/// Storage key holding the JSON-serialized `TokenPair`
pub const TOKEN_STORAGE_KEY: &str = "@tradepost:token";

/// Typed access to the two persisted session records.
///
/// The profile and the token pair live under independent keys and are never
/// written atomically together, so a reader can observe one without the
/// other. Undecodable content is reported as absent.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    async fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(value).map_err(|e| StorageError::write(key, e))?;
        self.store.set_item(key, &json).await
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.store.get_item(key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, error = %e, "Stored value is corrupt, treating as absent");
                Ok(None)
            }
        }
    }

    // ===== Profile =====

    pub async fn save_user(&self, user: &UserProfile) -> Result<(), StorageError> {
        self.save(USER_STORAGE_KEY, user).await
    }

    pub async fn load_user(&self) -> Result<Option<UserProfile>, StorageError> {
        self.load(USER_STORAGE_KEY).await
    }

    pub async fn remove_user(&self) -> Result<(), StorageError> {
        self.store.remove_item(USER_STORAGE_KEY).await
    }

    // ===== Tokens =====

    pub async fn save_tokens(&self, tokens: &TokenPair) -> Result<(), StorageError> {
        self.save(TOKEN_STORAGE_KEY, tokens).await
    }

    pub async fn load_tokens(&self) -> Result<Option<TokenPair>, StorageError> {
        self.load(TOKEN_STORAGE_KEY).await
    }

    pub async fn remove_tokens(&self) -> Result<(), StorageError> {
        self.store.remove_item(TOKEN_STORAGE_KEY).await
    }

    // ===== Both records =====

    /// Write the profile, then the tokens. Both writes are attempted; the
    /// first failure is returned.
    pub async fn save_session(&self, user: &UserProfile, tokens: &TokenPair) -> Result<(), StorageError> {
        let user_result = self.save_user(user).await;
        if let Err(ref e) = user_result {
            warn!(error = %e, "Failed to persist user profile");
        }
        let token_result = self.save_tokens(tokens).await;
        if let Err(ref e) = token_result {
            warn!(error = %e, "Failed to persist tokens");
        }
        user_result.and(token_result)
    }

    /// Read both records. Any read failure, corruption, missing or malformed
    /// record yields `None`.
    pub async fn load_session(&self) -> Option<(UserProfile, TokenPair)> {
        let user = self.load_user().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read stored profile");
            None
        });
        let tokens = self.load_tokens().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read stored tokens");
            None
        });

        match (user, tokens) {
            (Some(user), Some(tokens)) if user.is_well_formed() && tokens.is_well_formed() => {
                Some((user, tokens))
            }
            (Some(_), Some(_)) => {
                debug!("Stored session is malformed");
                None
            }
            (Some(_), None) | (None, Some(_)) => {
                debug!("Stored session is incomplete (torn write)");
                None
            }
            (None, None) => None,
        }
    }

    /// Remove both records. Both removals are attempted; the first failure is
    /// returned.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let user_result = self.remove_user().await;
        let token_result = self.remove_tokens().await;
        for err in [&user_result, &token_result].into_iter().filter_map(|r| r.as_ref().err()) {
            warn!(error = %err, "Failed to remove stored credentials");
        }
        user_result.and(token_result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store() -> (Arc<MemoryStore>, CredentialStore) {
        let memory = Arc::new(MemoryStore::new());
        (memory.clone(), CredentialStore::new(memory))
    }

    #[tokio::test]
    async fn test_save_and_load_session() {
        let (_memory, creds) = store();
        let user = UserProfile::new("u1", "Ana", "ana@x.com");
        let tokens = TokenPair::new("a1", "r1");

        creds.save_session(&user, &tokens).await.expect("save");
        assert_eq!(creds.load_session().await, Some((user, tokens)));
    }

    #[tokio::test]
    async fn test_corrupt_value_reads_as_absent() {
        let (memory, creds) = store();
        memory.set_item(USER_STORAGE_KEY, "{not-json").await.expect("set");

        assert_eq!(creds.load_user().await.expect("load"), None);
    }

    #[tokio::test]
    async fn test_torn_session_is_none() {
        let (_memory, creds) = store();
        creds
            .save_user(&UserProfile::new("u1", "Ana", "ana@x.com"))
            .await
            .expect("save");
        assert_eq!(creds.load_session().await, None);

        creds.remove_user().await.expect("remove");
        creds.save_tokens(&TokenPair::new("a1", "r1")).await.expect("save");
        assert_eq!(creds.load_session().await, None);
    }

    #[tokio::test]
    async fn test_malformed_tokens_are_rejected() {
        let (memory, creds) = store();
        creds
            .save_user(&UserProfile::new("u1", "Ana", "ana@x.com"))
            .await
            .expect("save");
        memory
            .set_item(TOKEN_STORAGE_KEY, r#"{"accessToken":"","refreshToken":"r1"}"#)
            .await
            .expect("set");
        assert_eq!(creds.load_session().await, None);
    }

    #[tokio::test]
    async fn test_clear_removes_both_keys() {
        let (memory, creds) = store();
        creds
            .save_session(&UserProfile::new("u1", "Ana", "ana@x.com"), &TokenPair::new("a1", "r1"))
            .await
            .expect("save");
        assert_eq!(memory.len().await, 2);

        creds.clear().await.expect("clear");
        creds.clear().await.expect("clear again");
        assert!(memory.is_empty().await);
    }
}
