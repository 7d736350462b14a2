//! API error types and user-facing messages.

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error body shape used by the API: `{"status": "error", "message": "..."}`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Prefer the server's own `message` field; fall back to the raw body.
    fn body_message(body: &str) -> String {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) if !parsed.message.trim().is_empty() => parsed.message,
            _ => Self::truncate_body(body),
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::body_message(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized(message),
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(message),
            code => ApiError::Rejected {
                status: code,
                message,
            },
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// The server-provided explanation, if the server gave one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized(m)
            | ApiError::AccessDenied(m)
            | ApiError::NotFound(m)
            | ApiError::Rejected { message: m, .. } => {
                let m = m.trim();
                if m.is_empty() || m.starts_with('{') || m.starts_with('<') {
                    None
                } else {
                    Some(m)
                }
            }
            _ => None,
        }
    }

    /// A message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        if let Some(message) = self.server_message() {
            return message.to_string();
        }
        match self {
            ApiError::Unauthorized(_) => "Invalid email or password".to_string(),
            ApiError::RateLimited => "Too many attempts. Please wait and try again.".to_string(),
            ApiError::NetworkError(e) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            ApiError::NetworkError(_) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            _ => "Something went wrong. Please try again later.".to_string(),
        }
    }
}
