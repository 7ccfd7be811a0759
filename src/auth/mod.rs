//! Upstream session management.
//!
//! The service talks to the upstream provider with one process-wide
//! credential pair. This module owns it:
//! - [`CredentialPair`] - access/refresh tokens plus the time they were issued
//! - [`AuthClient`] - password and refresh-token grants against the token endpoint
//! - [`CredentialStore`] - durable storage so restarts reuse the last pair
//! - [`SessionManager`] - hands out access tokens, refreshing or logging in as needed

mod client;
mod credentials;
mod error;
mod session;
mod store;

pub use client::{AuthClient, AuthConfig, DEFAULT_AUTH_URL};
pub use credentials::CredentialPair;
pub use error::AuthError;
pub use session::{SessionManager, TOKEN_VALIDITY};
pub use store::{CredentialStore, SqliteCredentialStore, StoreError};
