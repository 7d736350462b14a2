#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tradepost_core::auth::{TOKEN_STORAGE_KEY, USER_STORAGE_KEY};
use tradepost_core::{ApiClient, AuthSession, KeyValueStore, MemoryStore, StorageError};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Memory-backed store that can be told to fail writes or reads.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    failing_writes: HashSet<String>,
    failing_reads: bool,
}

impl FaultyStore {
    pub fn failing_writes(keys: &[&str]) -> Self {
        Self {
            failing_writes: keys.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn failing_reads() -> Self {
        Self {
            failing_reads: true,
            ..Default::default()
        }
    }

    pub async fn seed(&self, key: &str, value: &str) {
        self.inner.set_item(key, value).await.expect("seed store");
    }

    pub async fn raw(&self, key: &str) -> Option<String> {
        self.inner.get_item(key).await.expect("read store")
    }
}

#[async_trait]
impl KeyValueStore for FaultyStore {
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.failing_writes.contains(key) {
            return Err(StorageError::write(key, "disk full"));
        }
        self.inner.set_item(key, value).await
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.failing_reads {
            return Err(StorageError::read(key, "medium unavailable"));
        }
        self.inner.get_item(key).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        if self.failing_writes.contains(key) {
            return Err(StorageError::write(key, "read-only medium"));
        }
        self.inner.remove_item(key).await
    }
}

pub fn user_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "email": format!("{}@example.com", name.to_lowercase()),
        "password": "",
        "avatar": ""
    })
}

pub fn session_body(id: &str, name: &str, token: &str, refresh_token: &str) -> Value {
    json!({
        "user": user_json(id, name),
        "token": token,
        "refresh_token": refresh_token
    })
}

/// Mount `POST /sessions` answering `email`/`password` with a session.
pub async fn mount_sign_in(server: &MockServer, email: &str, password: &str, body: Value) {
    Mock::given(method("POST"))
        .and(path("/sessions"))
        .and(body_json(json!({ "email": email, "password": password })))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_rejected_sign_in(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "status": "error",
            "message": "Incorrect email or password."
        })))
        .mount(server)
        .await;
}

pub fn api_for(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri()).expect("api client")
}

pub fn session_with<S: KeyValueStore + 'static>(server: &MockServer, store: Arc<S>) -> AuthSession {
    AuthSession::new(api_for(server), store)
}

/// Seed a complete stored session: profile `id`/`name`, tokens `access`/`refresh`.
pub async fn seed_session(store: &dyn KeyValueStore, id: &str, name: &str, access: &str, refresh: &str) {
    store
        .set_item(USER_STORAGE_KEY, &json!({ "id": id, "name": name }).to_string())
        .await
        .expect("seed user");
    store
        .set_item(
            TOKEN_STORAGE_KEY,
            &json!({ "accessToken": access, "refreshToken": refresh }).to_string(),
        )
        .await
        .expect("seed tokens");
}
