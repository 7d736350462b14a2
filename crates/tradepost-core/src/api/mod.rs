//! REST API client module for the marketplace backend.
//!
//! This module provides the `ApiClient` used for identity calls (sign-in,
//! sign-up, token refresh) and for every authorized request the application
//! makes. Authorized requests carry `Authorization: Bearer <token>`; a `401`
//! on one of them is broadcast to `AuthFailureListener`s.

pub mod auth_failure;
pub mod client;
pub mod error;

pub use auth_failure::{AuthFailureListener, AuthFailureSubscription};
pub use client::{ApiClient, SessionResponse, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::ApiError;
