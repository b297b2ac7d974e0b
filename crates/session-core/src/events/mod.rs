//! Signalling events and the dispatch seam
//!
//! Events serialise to the relay's wire shape, `{"type": ..., "data": {...}}`,
//! with the field names browser clients already use (`fromUserId`,
//! `offerSDP`, `answerSDP`, ...).

use serde::{Deserialize, Serialize};

use crate::types::{Candidate, EndReason, SessionDescription, SessionId};
use skyrelay_registrar_core::UserId;

/// An event addressed to one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum SignallingEvent {
    IncomingCall(IncomingCall),
    CallAccepted(CallAccepted),
    IceCandidate(IceCandidate),
    CallEnded(CallEnded),
    CallFailed(CallFailed),
}

impl SignallingEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            SignallingEvent::IncomingCall(_) => "incomingCall",
            SignallingEvent::CallAccepted(_) => "callAccepted",
            SignallingEvent::IceCandidate(_) => "iceCandidate",
            SignallingEvent::CallEnded(_) => "callEnded",
            SignallingEvent::CallFailed(_) => "callFailed",
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            SignallingEvent::IncomingCall(e) => Some(&e.session_id),
            SignallingEvent::CallAccepted(e) => Some(&e.session_id),
            SignallingEvent::IceCandidate(e) => e.session_id.as_ref(),
            SignallingEvent::CallEnded(e) => Some(&e.session_id),
            SignallingEvent::CallFailed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCall {
    pub from_user_id: UserId,
    #[serde(rename = "offerSDP")]
    pub offer_sdp: SessionDescription,
    /// Caller's display name
    #[serde(default)]
    pub name: String,
    pub session_id: SessionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_name: Option<String>,
    /// Everyone invited to a group call, host excluded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAccepted {
    pub from_user_id: UserId,
    #[serde(rename = "answerSDP")]
    pub answer_sdp: SessionDescription,
    pub session_id: SessionId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub from_user_id: UserId,
    pub candidate: Candidate,
    /// Absent when the candidate raced ahead of its session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEnded {
    pub from_user_id: UserId,
    pub session_id: SessionId,
    pub reason: EndReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFailed {
    pub to_user_id: UserId,
    pub reason: String,
}

/// What happened to a dispatched event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Handed to a live connection
    Pushed,
    /// Appended to the recipient's poll queue
    Buffered,
    /// Recipient unreachable; nothing was delivered
    Dropped,
}

impl DispatchOutcome {
    pub fn is_delivered(self) -> bool {
        !matches!(self, DispatchOutcome::Dropped)
    }
}

/// Delivers events to users.
///
/// Implementations must not block: dispatch is fire-and-forget and is called
/// while the sending session's lock is held.
pub trait EventDispatcher: Send + Sync {
    fn dispatch(&self, to: &UserId, event: SignallingEvent) -> DispatchOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_incoming_call_wire_shape() {
        let event = SignallingEvent::IncomingCall(IncomingCall {
            from_user_id: UserId::from("1"),
            offer_sdp: SessionDescription(json!({"type": "offer", "sdp": "v=0"})),
            name: "alice".into(),
            session_id: SessionId::from("s1"),
            room_name: None,
            participants: Vec::new(),
        });

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "incomingCall",
                "data": {
                    "fromUserId": "1",
                    "offerSDP": {"type": "offer", "sdp": "v=0"},
                    "name": "alice",
                    "sessionId": "s1"
                }
            })
        );
        assert_eq!(event.name(), "incomingCall");
    }

    #[test]
    fn test_call_ended_reason_is_snake_case() {
        let event = SignallingEvent::CallEnded(CallEnded {
            from_user_id: UserId::from("2"),
            session_id: SessionId::from("s1"),
            reason: EndReason::Disconnected,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "callEnded");
        assert_eq!(value["data"]["reason"], "disconnected");
    }
}
