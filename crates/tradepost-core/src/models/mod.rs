//! Data models for the session layer.
//!
//! - `user`: the identity record and the token pair that back a session
//! - `profile`: payloads for remote profile and avatar changes

pub mod profile;
pub mod user;

pub use profile::{AvatarUpload, ProfileChanges, MAX_AVATAR_BYTES};
pub use user::{TokenPair, UserProfile};
