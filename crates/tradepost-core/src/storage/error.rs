//! Storage error types.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to write storage key {key}: {source}")]
    Write {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to read storage key {key}: {source}")]
    Read {
        key: String,
        #[source]
        source: BoxError,
    },
}

impl StorageError {
    pub fn write(key: &str, source: impl Into<BoxError>) -> Self {
        StorageError::Write {
            key: key.to_string(),
            source: source.into(),
        }
    }

    pub fn read(key: &str, source: impl Into<BoxError>) -> Self {
        StorageError::Read {
            key: key.to_string(),
            source: source.into(),
        }
    }

    pub fn key(&self) -> &str {
        match self {
            StorageError::Write { key, .. } | StorageError::Read { key, .. } => key,
        }
    }
}
