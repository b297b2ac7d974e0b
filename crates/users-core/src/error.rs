//! Error types for users-core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("username exists")]
    UserAlreadyExists(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Validation(String),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    /// Whether the caller sent something wrong, as opposed to a server fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::UserAlreadyExists(_) | Error::InvalidCredentials | Error::Validation(_)
        )
    }
}

impl From<password_hash::Error> for Error {
    fn from(err: password_hash::Error) -> Self {
        Error::PasswordHash(err.to_string())
    }
}
