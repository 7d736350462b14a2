//! Request payloads for remote profile changes.

use std::path::Path;

use serde::Serialize;

/// Largest avatar image the API accepts (5 MiB).
pub const MAX_AVATAR_BYTES: u64 = 5 * 1024 * 1024;

/// Body of `PUT /users`. Password fields are optional; omitted when unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileChanges {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_password: Option<String>,
}

impl ProfileChanges {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_password(mut self, old_password: impl Into<String>, password: impl Into<String>) -> Self {
        self.old_password = Some(old_password.into());
        self.password = Some(password.into());
        self
    }
}

/// An image selected for upload as the user's avatar.
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    pub extension: String,
    pub bytes: Vec<u8>,
}

impl AvatarUpload {
    pub fn new(extension: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            extension: extension.into().trim_start_matches('.').to_lowercase(),
            bytes,
        }
    }

    /// Read an image from disk, taking the extension from the file name.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg")
            .to_string();
        Ok(Self::new(extension, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn exceeds_limit(&self) -> bool {
        self.size() > MAX_AVATAR_BYTES
    }

    /// Uploaded file name: the owner's name plus the image extension, lowercased.
    pub fn file_name(&self, owner_name: &str) -> String {
        format!("{}.{}", owner_name, self.extension).to_lowercase()
    }

    pub fn mime_type(&self) -> String {
        match self.extension.as_str() {
            "jpg" | "jpeg" => "image/jpeg".to_string(),
            other => format!("image/{}", other),
        }
    }
}
