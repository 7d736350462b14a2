//! API client for the marketplace backend.
//!
//! This module provides the `ApiClient` struct: the single network layer
//! shared by the session and the rest of the application. It owns the
//! `Authorization` header applied to outgoing requests and raises the
//! authorization-failure signal when the server rejects the installed token.

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::models::{AvatarUpload, ProfileChanges, TokenPair, UserProfile};

use super::auth_failure::{AuthFailureListener, AuthFailureRegistry, AuthFailureSubscription};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const SESSIONS_PATH: &str = "/sessions";
const REFRESH_TOKEN_PATH: &str = "/sessions/refresh-token";
const USERS_PATH: &str = "/users";
const AVATAR_PATH: &str = "/users/avatar";

/// Body returned by `POST /sessions`. Every field is optional here so that an
/// incomplete response is reported as malformed instead of failing to parse.
#[derive(Deserialize)]
pub struct SessionResponse {
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl SessionResponse {
    /// Split into profile and token pair, if the response is well formed.
    pub fn into_parts(self) -> Option<(UserProfile, TokenPair)> {
        let user = self.user.filter(UserProfile::is_well_formed)?;
        let tokens = TokenPair::new(self.token?, self.refresh_token?);
        tokens.is_well_formed().then_some((user, tokens))
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct AvatarResponse {
    avatar: Option<String>,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct Registration<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Network layer for the marketplace API.
/// Clone is cheap: clones share the connection pool, the installed bearer
/// token and the authorization-failure listeners.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Arc<watch::Sender<Option<String>>>,
    auth_failures: Arc<AuthFailureRegistry>,
}

impl ApiClient {
    /// Create a new API client with the default timeout
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let (token, _) = watch::channel(None);

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Arc::new(token),
            auth_failures: Arc::new(AuthFailureRegistry::default()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ===== Authorization header =====

    /// Install the bearer token applied to every subsequent request
    pub fn set_token(&self, token: &str) {
        self.token.send_replace(Some(token.to_string()));
        debug!("Bearer token installed");
    }

    pub fn clear_token(&self) {
        if self.token.send_replace(None).is_some() {
            debug!("Bearer token cleared");
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.borrow().is_some()
    }

    /// Current value of the `Authorization` header, e.g. `Bearer a1`.
    pub fn authorization_header(&self) -> Option<String> {
        self.token
            .borrow()
            .as_ref()
            .map(|token| format!("Bearer {}", token))
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(value) = self.authorization_header() {
            headers.insert(header::AUTHORIZATION, header::HeaderValue::from_str(&value)?);
        }
        Ok(headers)
    }

    // ===== Authorization failure signal =====

    /// Register a listener for `401` responses on authorized requests.
    pub fn on_auth_failure(&self, listener: Arc<dyn AuthFailureListener>) -> AuthFailureSubscription {
        self.auth_failures.subscribe(listener)
    }

    pub fn auth_failure_listener_count(&self) -> usize {
        self.auth_failures.listener_count()
    }

    // ===== Request plumbing =====

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request on behalf of the signed-in user.
    /// A `401` notifies the auth-failure listeners before the error is returned.
    async fn send_authorized(&self, request: RequestBuilder, url: &str) -> Result<Response, ApiError> {
        let response = request.headers(self.auth_headers()?).send().await?;

        match Self::check_response(response).await {
            Err(err) if err.is_unauthorized() => {
                warn!(url, "Request rejected as unauthorized");
                self.auth_failures.notify().await;
                Err(err)
            }
            other => other,
        }
    }

    /// Send a credential exchange. These never carry the bearer token and a
    /// `401` here means "wrong credentials", not "session revoked".
    async fn send_public(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request.send().await?;
        Self::check_response(response).await
    }

    async fn parse_json<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON from {}: {}", url, e)))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self.send_authorized(self.client.get(&url), &url).await?;
        Self::parse_json(response, &url).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self.send_authorized(self.client.post(&url).json(body), &url).await?;
        Self::parse_json(response, &url).await
    }

    /// PUT with a JSON body; the response body is ignored.
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let url = self.url(path);
        self.send_authorized(self.client.put(&url).json(body), &url).await?;
        Ok(())
    }

    pub async fn patch_multipart<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self.send_authorized(self.client.patch(&url).multipart(form), &url).await?;
        Self::parse_json(response, &url).await
    }

    // ===== Identity endpoints =====

    /// Exchange email and password for a profile and token pair
    pub async fn create_session(&self, email: &str, password: &str) -> Result<SessionResponse, ApiError> {
        let url = self.url(SESSIONS_PATH);
        let request = self.client.post(&url).json(&Credentials { email, password });
        let response = self.send_public(request).await?;
        Self::parse_json(response, &url).await
    }

    /// Create a new account
    pub async fn register_user(&self, name: &str, email: &str, password: &str) -> Result<(), ApiError> {
        let url = self.url(USERS_PATH);
        let request = self.client.post(&url).json(&Registration { name, email, password });
        self.send_public(request).await?;
        Ok(())
    }

    /// Trade a refresh token for a new token pair
    pub async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let url = self.url(REFRESH_TOKEN_PATH);
        let request = self.client.post(&url).json(&RefreshRequest { refresh_token });
        let response = self.send_public(request).await?;
        let refreshed: RefreshResponse = Self::parse_json(response, &url).await?;

        let tokens = TokenPair::new(refreshed.token, refreshed.refresh_token);
        if !tokens.is_well_formed() {
            return Err(ApiError::InvalidResponse("Refresh returned an unusable token".to_string()));
        }
        Ok(tokens)
    }

    /// Save name and password changes for the signed-in user
    pub async fn update_user(&self, changes: &ProfileChanges) -> Result<(), ApiError> {
        self.put(USERS_PATH, changes).await
    }

    /// Upload a new avatar image, returning the stored avatar reference
    pub async fn upload_avatar(&self, upload: &AvatarUpload, owner_name: &str) -> Result<String, ApiError> {
        let part = Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name(owner_name))
            .mime_str(&upload.mime_type())?;
        let form = Form::new().part("avatar", part);

        let response: AvatarResponse = self.patch_multipart(AVATAR_PATH, form).await?;
        response
            .avatar
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| ApiError::InvalidResponse("Avatar upload returned no avatar".to_string()))
    }
}
