//! Error types for session tracking

use thiserror::Error;

use crate::types::{CallState, SessionId};
use skyrelay_registrar_core::UserId;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors returned by the call session tracker.
///
/// None of these are fatal: they describe stale or out-of-order call-control
/// messages, which the relay logs and otherwise ignores.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Unknown, or already ended and released
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Invalid transition for session {session_id}: {from} -> {to}")]
    InvalidTransition {
        session_id: SessionId,
        from: CallState,
        to: CallState,
    },

    #[error("User {user_id} is not an active participant of session {session_id}")]
    NotParticipant { session_id: SessionId, user_id: UserId },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl SessionError {
    pub fn session_not_found(session_id: &SessionId) -> Self {
        Self::SessionNotFound(session_id.clone())
    }

    pub fn invalid_transition(session_id: &SessionId, from: CallState, to: CallState) -> Self {
        Self::InvalidTransition {
            session_id: session_id.clone(),
            from,
            to,
        }
    }

    pub fn not_participant(session_id: &SessionId, user_id: &UserId) -> Self {
        Self::NotParticipant {
            session_id: session_id.clone(),
            user_id: user_id.clone(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Stale or out-of-order control message, as opposed to a malformed one
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::SessionNotFound(_) | Self::InvalidTransition { .. } | Self::NotParticipant { .. })
    }
}
