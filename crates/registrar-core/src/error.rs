//! Error types for the presence directory

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistrarError {
    #[error("User {0} is push-connected; nothing to poll")]
    PushConnected(String),

    #[error("Invalid user id: {0:?}")]
    InvalidUserId(String),
}

pub type Result<T> = std::result::Result<T, RegistrarError>;
