//! Error types for the call engine

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use skyrelay_registrar_core::{RegistrarError, UserId};
use skyrelay_session_core::SessionError;

pub type Result<T> = std::result::Result<T, CallEngineError>;

#[derive(Error, Debug)]
pub enum CallEngineError {
    #[error(transparent)]
    Infra(#[from] skyrelay_infra_common::Error),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Registrar error: {0}")]
    Registrar(#[from] RegistrarError),

    #[error("{0}")]
    Users(#[from] skyrelay_users_core::Error),

    /// A user-addressed call-control message matched no live session
    #[error("No call between {from} and {to}")]
    NoSession { from: UserId, to: UserId },

    #[error("{0}")]
    BadRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CallEngineError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Call-control that arrived too late or out of order. Transports log
    /// these and carry on.
    pub fn is_stale(&self) -> bool {
        match self {
            Self::Session(e) => e.is_stale(),
            Self::NoSession { .. } => true,
            _ => false,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        use skyrelay_users_core::Error as UsersError;

        match self {
            Self::Users(UsersError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            Self::Users(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Session(SessionError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            Self::Session(SessionError::NotParticipant { .. }) => StatusCode::FORBIDDEN,
            Self::Registrar(RegistrarError::InvalidUserId(_)) => StatusCode::BAD_REQUEST,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Session(_) | Self::NoSession { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CallEngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self);
        }
        (status, Json(json!({ "ok": false, "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyrelay_session_core::SessionId;

    #[test]
    fn test_status_codes() {
        let creds = CallEngineError::from(skyrelay_users_core::Error::InvalidCredentials);
        assert_eq!(creds.status_code(), StatusCode::UNAUTHORIZED);

        let exists = CallEngineError::from(skyrelay_users_core::Error::UserAlreadyExists("a".into()));
        assert_eq!(exists.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(exists.to_string(), "username exists");

        let gone = CallEngineError::from(SessionError::session_not_found(&SessionId::from("s")));
        assert!(gone.is_stale());
    }

    #[test]
    fn test_no_session_is_stale() {
        let err = CallEngineError::NoSession {
            from: UserId::from("1"),
            to: UserId::from("2"),
        };
        assert!(err.is_stale());
        assert_eq!(err.to_string(), "No call between 1 and 2");
    }
}
