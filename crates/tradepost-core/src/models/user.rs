//! Identity records shared by the session, the credential store and the API client.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// The signed-in user's identity record.
///
/// Equality ignores `password`: it is never persisted, so a profile read
/// back from storage must still compare equal to the one that was saved.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Returned by the identity endpoint but never consumed client-side.
    /// Kept in memory only; it is never written to storage or sent anywhere.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar: Option<String>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            password: None,
            avatar: None,
        }
    }

    /// A profile without an id cannot back a session.
    pub fn is_well_formed(&self) -> bool {
        !self.id.trim().is_empty()
    }

    /// Full URL of the avatar image served by the API, if one is set.
    pub fn avatar_url(&self, base_url: &str) -> Option<String> {
        self.avatar
            .as_deref()
            .map(|avatar| format!("{}/avatar/{}", base_url.trim_end_matches('/'), avatar))
    }
}

impl PartialEq for UserProfile {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.email == other.email
            && self.avatar == other.avatar
    }
}

impl Eq for UserProfile {}

impl fmt::Debug for UserProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserProfile")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("avatar", &self.avatar)
            .finish()
    }
}

/// Access + refresh token pair issued by the identity endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    #[serde(alias = "token")]
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Both tokens must be non-empty and usable inside an HTTP header.
    pub fn is_well_formed(&self) -> bool {
        is_header_safe(&self.access_token) && is_header_safe(&self.refresh_token)
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

fn is_header_safe(token: &str) -> bool {
    !token.is_empty() && !token.chars().any(|c| c.is_control() || c.is_whitespace())
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_never_serializes_password() {
        let mut user = UserProfile::new("u1", "Ana", "ana@example.com");
        user.password = Some("hunter2".to_string());

        let json = serde_json::to_string(&user).expect("serialize profile");
        assert!(!json.contains("password"));
        assert!(!json.contains("hunter2"));
    }

    #[test]
    fn test_profile_equality_ignores_password() {
        let json = r#"{"id":"u1","name":"Ana","email":"ana@example.com","password":""}"#;
        let from_server: UserProfile = serde_json::from_str(json).expect("parse profile");
        let stored = serde_json::to_string(&from_server).expect("serialize profile");
        let reloaded: UserProfile = serde_json::from_str(&stored).expect("reparse profile");

        assert_eq!(from_server.password.as_deref(), Some(""));
        assert_eq!(reloaded.password, None);
        assert_eq!(reloaded, from_server);

        let mut renamed = reloaded.clone();
        renamed.name = "Ana Souza".to_string();
        assert_ne!(renamed, from_server);
    }

    #[test]
    fn test_profile_empty_avatar_is_absent() {
        let json = r#"{"id":"u1","name":"Ana","email":"ana@example.com","password":"x","avatar":""}"#;
        let user: UserProfile = serde_json::from_str(json).expect("parse profile");
        assert_eq!(user.avatar, None);
        assert_eq!(user.password.as_deref(), Some("x"));
    }

    #[test]
    fn test_profile_only_requires_id() {
        let user: UserProfile = serde_json::from_str(r#"{"id":"u1","name":"Ana"}"#).expect("parse");
        assert_eq!(user.email, "");
        assert!(user.is_well_formed());
        assert!(serde_json::from_str::<UserProfile>(r#"{"name":"Ana"}"#).is_err());
    }

    #[test]
    fn test_profile_avatar_url() {
        let mut user = UserProfile::new("u1", "Ana", "ana@example.com");
        assert_eq!(user.avatar_url("http://localhost:3333"), None);

        user.avatar = Some("abc.png".to_string());
        assert_eq!(
            user.avatar_url("http://localhost:3333/").as_deref(),
            Some("http://localhost:3333/avatar/abc.png")
        );
    }

    #[test]
    fn test_profile_well_formed() {
        assert!(UserProfile::new("u1", "Ana", "a@x.com").is_well_formed());
        assert!(!UserProfile::new("  ", "Ana", "a@x.com").is_well_formed());
    }

    #[test]
    fn test_token_pair_layout() {
        let tokens = TokenPair::new("a1", "r1");
        let json = serde_json::to_value(&tokens).expect("serialize tokens");
        assert_eq!(json["accessToken"], "a1");
        assert_eq!(json["refreshToken"], "r1");

        // Older clients stored the access token under `token`
        let legacy: TokenPair =
            serde_json::from_str(r#"{"token":"a1","refreshToken":"r1"}"#).expect("parse legacy");
        assert_eq!(legacy, tokens);
    }

    #[test]
    fn test_token_pair_well_formed() {
        assert!(TokenPair::new("a1", "r1").is_well_formed());
        assert!(!TokenPair::new("", "r1").is_well_formed());
        assert!(!TokenPair::new("a1", "").is_well_formed());
        assert!(!TokenPair::new("a 1", "r1").is_well_formed());
        assert!(!TokenPair::new("a1\n", "r1").is_well_formed());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut user = UserProfile::new("u1", "Ana", "a@x.com");
        user.password = Some("hunter2".to_string());
        assert!(!format!("{:?}", user).contains("hunter2"));
        assert!(!format!("{:?}", TokenPair::new("secret-a", "secret-r")).contains("secret"));
    }
}
