//! Persistent key-value storage backends.
//!
//! The session layer only needs three operations on string keys: set, get
//! and remove. Writes are last-write-wins per key; there are no transactions
//! across keys.
//!
//! Backends:
//! - `FileStore`: one JSON file per key in a data directory
//! - `KeyringStore`: OS keychain entries via `keyring`
//! - `MemoryStore`: process-local map, for tests and ephemeral sessions

pub mod error;
pub mod file;
pub mod keychain;
pub mod memory;

use async_trait::async_trait;

pub use error::StorageError;
pub use file::FileStore;
pub use keychain::KeyringStore;
pub use memory::MemoryStore;

/// Opaque get/set/remove capability over serialized values.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Persist `value` under `key`, overwriting any prior value.
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Return the stored value, or `None` if it was never written or was removed.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Delete `key`. Removing an absent key is not an error.
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}
