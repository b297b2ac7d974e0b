//! Core types for session tracking

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique call session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Offer or answer description, relayed verbatim.
///
/// Browsers send the serialised `RTCSessionDescription` (`{type, sdp}`), but
/// the relay never looks inside it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionDescription(pub serde_json::Value);

impl From<serde_json::Value> for SessionDescription {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// ICE candidate record, relayed verbatim
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Candidate(pub serde_json::Value);

impl From<serde_json::Value> for Candidate {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Call session state. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Initiating,
    Offered,
    Answered,
    /// Media is flowing. The relay cannot observe media, so only
    /// [`crate::CallSessionTracker::mark_active`] moves a session here.
    Active,
    Ended,
}

impl CallState {
    /// Whether `self -> next` is a legal forward step
    pub fn can_transition_to(self, next: CallState) -> bool {
        use CallState::*;
        match (self, next) {
            (Ended, _) => false,
            (_, Ended) => true,
            (Initiating, Offered) | (Offered, Answered) | (Answered, Active) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == CallState::Ended
    }

    /// States in which candidates are relayed
    pub fn accepts_candidates(self) -> bool {
        matches!(self, CallState::Offered | CallState::Answered | CallState::Active)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallState::Initiating => "initiating",
            CallState::Offered => "offered",
            CallState::Answered => "answered",
            CallState::Active => "active",
            CallState::Ended => "ended",
        };
        f.write_str(name)
    }
}

/// Per-callee status inside a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    Invited,
    Joined,
    Left,
}

impl ParticipantStatus {
    pub fn is_present(self) -> bool {
        !matches!(self, ParticipantStatus::Left)
    }
}

/// One-to-one call or group call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CallKind {
    Direct,
    Group { room_name: Option<String> },
}

impl CallKind {
    pub fn is_group(&self) -> bool {
        matches!(self, CallKind::Group { .. })
    }
}

/// Who can end a group call for everybody
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupEndPolicy {
    /// The host's `end` terminates the call for everyone. A participant's
    /// `end` only removes that participant.
    #[default]
    HostEndsAll,
    /// Everybody, the host included, only removes themselves. The call ends
    /// once fewer than two members remain.
    LastParticipantLeaves,
}

/// Why a session (or a participant's part in it) ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Explicit end from a participant
    Hangup,
    /// The participant's connection went away
    Disconnected,
    /// Nobody answered within the ring timeout
    Timeout,
    /// The callee was unreachable and the relay does not buffer
    Unreachable,
    /// The caller offered the same callee again before this offer was answered
    Superseded,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EndReason::Hangup => "hangup",
            EndReason::Disconnected => "disconnected",
            EndReason::Timeout => "timeout",
            EndReason::Unreachable => "unreachable",
            EndReason::Superseded => "superseded",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CallState::*;

    #[test]
    fn test_forward_only_transitions() {
        assert!(Initiating.can_transition_to(Offered));
        assert!(Offered.can_transition_to(Answered));
        assert!(Answered.can_transition_to(Active));
        assert!(Offered.can_transition_to(Ended));
        assert!(Active.can_transition_to(Ended));

        assert!(!Answered.can_transition_to(Offered));
        assert!(!Initiating.can_transition_to(Answered));
        assert!(!Offered.can_transition_to(Offered));
        assert!(!Ended.can_transition_to(Ended));
        assert!(!Ended.can_transition_to(Offered));
    }

    #[test]
    fn test_group_policy_serde_names() {
        let policy: GroupEndPolicy = serde_json::from_str("\"last_participant_leaves\"").unwrap();
        assert_eq!(policy, GroupEndPolicy::LastParticipantLeaves);
        assert_eq!(GroupEndPolicy::default(), GroupEndPolicy::HostEndsAll);
    }
}
