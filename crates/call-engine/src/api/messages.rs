//! Wire messages for both transports
//!
//! Field names follow what browser clients send: camelCase, with the SDP
//! fields spelled `offerSDP` / `answerSDP`. Every call-control message may
//! carry an optional `sessionId`; clients that ignore session ids are
//! resolved by user id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use skyrelay_registrar_core::UserId;
use skyrelay_session_core::{Candidate, SessionDescription, SessionId, SignallingEvent};
use skyrelay_users_core::UserSummary;

// ---- REST requests ----

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollQuery {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCallRequest {
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    #[serde(rename = "offerSDP")]
    pub offer_sdp: SessionDescription,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRequest {
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    #[serde(default)]
    pub candidate: Candidate,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

/// `toUserId` is the caller being answered
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    #[serde(rename = "answerSDP")]
    pub answer_sdp: SessionDescription,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndCallRequest {
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCallRequest {
    #[serde(default)]
    pub room_name: Option<String>,
    pub user_ids: Vec<UserId>,
    pub host_user_id: UserId,
    #[serde(rename = "offerSDP", default)]
    pub offer_sdp: SessionDescription,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

// ---- REST responses ----

#[derive(Debug, Clone, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub ok: bool,
    /// `null` when the callee was offline and nothing was started
    pub session_id: Option<SessionId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollResponse {
    pub ok: bool,
    pub events: Vec<SignallingEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub ok: bool,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsersResponse {
    pub ok: bool,
    pub users: Vec<UserSummary>,
}

// ---- WebSocket frames ----

/// Messages a socket client sends, framed `{"event": ..., "data": {...}}`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    RegisterSocket(RegisterSocket),
    CallUser(CallUser),
    AcceptCall(AcceptCall),
    IceCandidate(IceCandidateMessage),
    EndCall(EndCall),
    CreateGroupCall(CreateGroupCall),
}

impl ClientMessage {
    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::RegisterSocket(_) => "registerSocket",
            ClientMessage::CallUser(_) => "callUser",
            ClientMessage::AcceptCall(_) => "acceptCall",
            ClientMessage::IceCandidate(_) => "iceCandidate",
            ClientMessage::EndCall(_) => "endCall",
            ClientMessage::CreateGroupCall(_) => "createGroupCall",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterSocket {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallUser {
    pub to_user_id: UserId,
    #[serde(rename = "offerSDP", default)]
    pub offer_sdp: SessionDescription,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptCall {
    pub caller_user_id: UserId,
    #[serde(rename = "answerSDP", default)]
    pub answer_sdp: SessionDescription,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidateMessage {
    pub to_user_id: UserId,
    #[serde(default)]
    pub candidate: Candidate,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndCall {
    pub to_user_id: UserId,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

/// `hostUserId`, when present, must match the registered socket user
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupCall {
    #[serde(default)]
    pub room_name: Option<String>,
    pub user_ids: Vec<UserId>,
    #[serde(default)]
    pub host_user_id: Option<UserId>,
    #[serde(rename = "offerSDP", default)]
    pub offer_sdp: SessionDescription,
    #[serde(default)]
    pub name: String,
}

/// Outbound socket frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerFrame {
    pub event: String,
    pub data: Value,
}

impl From<&SignallingEvent> for ServerFrame {
    fn from(event: &SignallingEvent) -> Self {
        // Events serialise as {"type", "data"}; sockets use {"event", "data"}
        let data = match serde_json::to_value(event) {
            Ok(Value::Object(mut fields)) => fields.remove("data").unwrap_or(Value::Null),
            _ => Value::Null,
        };
        Self {
            event: event.name().to_string(),
            data,
        }
    }
}
