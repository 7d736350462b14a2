use thiserror::Error;
use tracing::debug;

use crate::api::ApiError;
use crate::models::MAX_AVATAR_BYTES;
use crate::storage::StorageError;

/// Sign-in (or sign-up) did not produce a session. Display text is user-facing.
#[derive(Error, Debug)]
pub enum SignInError {
    /// The identity endpoint refused the request
    #[error("{0}")]
    Rejected(String),

    #[error("Unexpected response from the server. Please try again later.")]
    MalformedResponse,

    /// Network failure, timeout or server error
    #[error("{message}")]
    Unavailable {
        message: String,
        #[source]
        source: ApiError,
    },
}

impl SignInError {
    pub(crate) fn from_api(err: ApiError) -> Self {
        match err {
            ApiError::InvalidResponse(ref detail) => {
                debug!(detail, "Identity response could not be parsed");
                SignInError::MalformedResponse
            }
            ApiError::Unauthorized(_)
            | ApiError::AccessDenied(_)
            | ApiError::NotFound(_)
            | ApiError::Rejected { .. } => SignInError::Rejected(err.user_message()),
            other => SignInError::Unavailable {
                message: other.user_message(),
                source: other,
            },
        }
    }

    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// The in-memory profile could not be updated or persisted.
#[derive(Error, Debug)]
pub enum ProfilePersistError {
    #[error("No active session")]
    NotAuthenticated,

    /// The in-memory profile was updated; the stored copy is stale.
    #[error("Profile updated but could not be saved: {0}")]
    Storage(#[from] StorageError),
}

/// A remote profile change (name, password, avatar) failed.
#[derive(Error, Debug)]
pub enum ProfileUpdateError {
    #[error("No active session")]
    NotAuthenticated,

    #[error("Avatar image is too large ({size} bytes, limit {limit} bytes)")]
    AvatarTooLarge { size: u64, limit: u64 },

    #[error(transparent)]
    Remote(#[from] ApiError),

    #[error(transparent)]
    Persist(#[from] ProfilePersistError),
}

impl ProfileUpdateError {
    pub(crate) fn avatar_too_large(size: u64) -> Self {
        ProfileUpdateError::AvatarTooLarge {
            size,
            limit: MAX_AVATAR_BYTES,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ProfileUpdateError::NotAuthenticated => "Please sign in again.".to_string(),
            ProfileUpdateError::AvatarTooLarge { limit, .. } => format!(
                "This image is too large. Choose one up to {}MB.",
                limit / 1024 / 1024
            ),
            ProfileUpdateError::Remote(e) => e.user_message(),
            ProfileUpdateError::Persist(e) => e.to_string(),
        }
    }
}

/// Refreshing the session tokens failed.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No active session")]
    NotAuthenticated,

    /// The refresh token was rejected; the session has been signed out.
    #[error("Session expired. Please sign in again.")]
    Expired,

    #[error(transparent)]
    Remote(#[from] ApiError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_sign_in_error_from_rejection_uses_server_message() {
        let api = ApiError::from_status(StatusCode::UNAUTHORIZED, r#"{"message":"Wrong password"}"#);
        let err = SignInError::from_api(api);
        assert!(matches!(err, SignInError::Rejected(_)));
        assert_eq!(err.user_message(), "Wrong password");
    }

    #[test]
    fn test_sign_in_error_from_invalid_response() {
        let err = SignInError::from_api(ApiError::InvalidResponse("bad json".to_string()));
        assert!(matches!(err, SignInError::MalformedResponse));
    }

    #[test]
    fn test_sign_in_error_from_server_error() {
        let api = ApiError::from_status(StatusCode::SERVICE_UNAVAILABLE, "");
        let err = SignInError::from_api(api);
        assert!(matches!(err, SignInError::Unavailable { .. }));
        assert_eq!(err.user_message(), "Something went wrong. Please try again later.");
    }

    #[test]
    fn test_avatar_too_large_message() {
        let err = ProfileUpdateError::avatar_too_large(MAX_AVATAR_BYTES + 1);
        assert_eq!(err.user_message(), "This image is too large. Choose one up to 5MB.");
    }
}
