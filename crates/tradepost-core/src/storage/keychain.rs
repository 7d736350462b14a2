//! Key-value store backed by the OS keychain.

use async_trait::async_trait;
use keyring::Entry;

use super::{KeyValueStore, StorageError};

const DEFAULT_SERVICE_NAME: &str = "tradepost";

/// Stores each key as a separate keychain entry under one service name.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> keyring::Result<Entry> {
        Entry::new(&self.service, key)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME)
    }
}

#[async_trait]
impl KeyValueStore for KeyringStore {
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)
            .and_then(|entry| entry.set_password(value))
            .map_err(|e| StorageError::write(key, e))
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key).and_then(|entry| entry.get_password()) {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StorageError::read(key, e)),
        }
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key).and_then(|entry| entry.delete_credential()) {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StorageError::write(key, e)),
        }
    }
}
