//! # Users-Core
//!
//! User accounts for the SkyRelay signalling relay.
//!
//! This crate provides:
//! - User storage in SQLite
//! - Password hashing and verification with Argon2
//! - Case-insensitive username prefix search
//!
//! Accounts are only an identity layer: the relay addresses peers by the
//! numeric user id handed out here, but it never requires a login before
//! signalling.

pub mod auth;
pub mod config;
pub mod error;
pub mod types;
pub mod user_store;
pub mod validation;

pub use auth::AuthenticationService;
pub use config::UsersConfig;
pub use error::{Error, Result};
pub use types::{CreateUserRequest, User, UserSummary};
pub use user_store::{SqliteUserStore, UserStore};

use std::sync::Arc;

/// Open the user database described by `config` and build the service on top
pub async fn init(config: UsersConfig) -> Result<AuthenticationService> {
    let store = SqliteUserStore::new(&config.database_url).await?;
    Ok(AuthenticationService::new(Arc::new(store), config))
}
