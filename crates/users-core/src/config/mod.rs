//! Configuration for users-core

use serde::{Deserialize, Serialize};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsersConfig {
    /// sqlx SQLite URL, e.g. `sqlite://users.db?mode=rwc` or `sqlite::memory:`
    pub database_url: String,
    pub min_password_length: usize,
    /// Maximum number of users one search returns
    pub search_limit: u32,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://skyrelay-users.db?mode=rwc".to_string(),
            min_password_length: 1,
            search_limit: 20,
        }
    }
}

impl UsersConfig {
    /// In-memory database, handy for tests and throwaway relays
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            ..Self::default()
        }
    }
}
