//! File-backed key-value store.
//!
//! Each key maps to `<dir>/<sanitized key>.json`. Values are written to a
//! temporary sibling file and renamed into place so a crash mid-write never
//! leaves a half-written value behind.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{KeyValueStore, StorageError};

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.item_path(key);
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::write(key, e))?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|e| StorageError::write(key, e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))
                .map_err(|e| StorageError::write(key, e))?;
        }
        fs::rename(&tmp, &path).map_err(|e| StorageError::write(key, e))?;

        debug!(key, path = %path.display(), "Stored item");
        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.item_path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::read(key, e)),
        }
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.item_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::write(key, e)),
        }
    }
}

/// Map a storage key like `@tradepost:user` to a safe file stem.
fn sanitize_key(key: &str) -> String {
    let sanitized: String = key
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let trimmed = sanitized.trim_matches('_');
    if trimmed.is_empty() {
        "default".to_string()
    } else {
        trimmed.to_string()
    }
}
