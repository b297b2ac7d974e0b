//! Authentication service
//!
//! Registration, password login and user search. Argon2 work runs on the
//! blocking pool so a burst of logins cannot stall the signalling tasks.

use std::sync::Arc;

use argon2::Argon2;
use once_cell::sync::Lazy;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use tracing::{debug, info};

use crate::config::UsersConfig;
use crate::error::{Error, Result};
use crate::types::{CreateUserRequest, UserSummary};
use crate::user_store::UserStore;
use crate::validation::{validate_password, validate_username};

// Verified against when the username is unknown, so a miss costs the same as a wrong password
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| hash_password("skyrelay-dummy-password").ok());

/// Hash `password` into a PHC string
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Check `password` against a stored PHC string
pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthenticationService {
    store: Arc<dyn UserStore>,
    config: UsersConfig,
}

impl std::fmt::Debug for AuthenticationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AuthenticationService {
    pub fn new(store: Arc<dyn UserStore>, config: UsersConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    /// Create an account. Both fields are trimmed first.
    pub async fn register(&self, request: CreateUserRequest) -> Result<UserSummary> {
        let username = validate_username(&request.username)?;
        let password = validate_password(&request.password, self.config.min_password_length)?;

        if self.store.get_user_by_username(&username).await?.is_some() {
            return Err(Error::UserAlreadyExists(username));
        }

        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| Error::PasswordHash(e.to_string()))??;

        let user = self.store.create_user(&username, &password_hash).await?;
        info!("Registered user {} ({})", user.username, user.id);
        Ok(user.into())
    }

    /// Check credentials. Every failure is [`Error::InvalidCredentials`].
    pub async fn login(&self, username: &str, password: &str) -> Result<UserSummary> {
        let username = username.trim().to_string();
        let password = password.trim().to_string();

        let user = if username.is_empty() {
            None
        } else {
            self.store.get_user_by_username(&username).await?
        };

        let stored = user.as_ref().map(|u| u.password_hash.clone());
        let verified = tokio::task::spawn_blocking(move || match stored {
            Some(phc) => verify_password(&password, &phc),
            None => {
                if let Some(dummy) = DUMMY_HASH.as_deref() {
                    let _ = verify_password(&password, dummy);
                }
                false
            }
        })
        .await
        .map_err(|e| Error::PasswordHash(e.to_string()))?;

        match user {
            Some(user) if verified => {
                debug!("User {} logged in", user.id);
                Ok(user.into())
            }
            _ => Err(Error::InvalidCredentials),
        }
    }

    /// Prefix search. A blank query matches nobody.
    pub async fn search(&self, query: &str) -> Result<Vec<UserSummary>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.store.search_users(query, self.config.search_limit).await
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<UserSummary>> {
        Ok(self.store.get_user(id).await?.map(UserSummary::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let phc = hash_password("secret").unwrap();
        assert!(phc.starts_with("$argon2"));
        assert!(verify_password("secret", &phc));
        assert!(!verify_password("Secret", &phc));
    }

    #[test]
    fn test_garbage_hash_never_verifies() {
        assert!(!verify_password("secret", "not-a-phc-string"));
    }
}
