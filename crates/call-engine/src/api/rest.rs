//! REST polling transport

use axum::Json;
use axum::extract::{Query, State};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::info;

use super::AppState;
use super::messages::{
    AnswerRequest, CandidateRequest, EndCallRequest, GroupCallRequest, OkResponse, PollQuery, PollResponse,
    SessionResponse, StartCallRequest,
};
use crate::coordinator::log_outcome;
use crate::error::Result;

/// Stale call-control is logged and still acknowledged
fn acknowledge<T>(operation: &str, user: &skyrelay_registrar_core::UserId, result: Result<T>) -> Result<Json<OkResponse>> {
    log_outcome(operation, user, &result);
    match result {
        Ok(_) => Ok(Json(OkResponse::ok())),
        Err(e) if e.is_stale() => Ok(Json(OkResponse::ok())),
        Err(e) => Err(e),
    }
}

/// `GET /api/poll?userId=`
pub async fn poll(State(state): State<AppState>, Query(query): Query<PollQuery>) -> Result<Json<PollResponse>> {
    let events = state.coordinator.poll(&query.user_id)?;
    Ok(Json(PollResponse { ok: true, events }))
}

/// `POST /api/call/start`
pub async fn start_call(
    State(state): State<AppState>,
    Json(req): Json<StartCallRequest>,
) -> Result<Json<SessionResponse>> {
    // The caller is evidently online, whatever transport they use for events
    state.coordinator.register_poll(&req.from_user_id)?;

    let session_id = state
        .coordinator
        .call_user(req.from_user_id, req.to_user_id, req.offer_sdp, req.name)
        .await?;
    Ok(Json(SessionResponse { ok: true, session_id }))
}

/// `POST /api/call/candidate`
pub async fn candidate(State(state): State<AppState>, Json(req): Json<CandidateRequest>) -> Result<Json<OkResponse>> {
    let from = req.from_user_id.clone();
    let result = state
        .coordinator
        .ice_candidate(req.from_user_id, req.to_user_id, req.candidate, req.session_id)
        .await;
    acknowledge("candidate", &from, result)
}

/// `POST /api/call/answer`
pub async fn answer(State(state): State<AppState>, Json(req): Json<AnswerRequest>) -> Result<Json<OkResponse>> {
    let from = req.from_user_id.clone();
    let result = state
        .coordinator
        .accept_call(req.from_user_id, req.to_user_id, req.answer_sdp, req.session_id)
        .await;
    acknowledge("answer", &from, result)
}

/// `POST /api/call/end`
pub async fn end_call(State(state): State<AppState>, Json(req): Json<EndCallRequest>) -> Result<Json<OkResponse>> {
    let from = req.from_user_id.clone();
    let result = state
        .coordinator
        .end_call(req.from_user_id, req.to_user_id, req.session_id)
        .await;
    acknowledge("end", &from, result)
}

/// `POST /api/call/group`
pub async fn group_call(
    State(state): State<AppState>,
    Json(req): Json<GroupCallRequest>,
) -> Result<Json<SessionResponse>> {
    state.coordinator.register_poll(&req.host_user_id)?;

    let session_id = state
        .coordinator
        .create_group_call(req.host_user_id, req.room_name, req.user_ids, req.offer_sdp, req.name)
        .await?;
    info!("Group call {} created over REST", session_id);
    Ok(Json(SessionResponse {
        ok: true,
        session_id: Some(session_id),
    }))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let stats = state.coordinator.stats();
    let uptime = (Utc::now() - state.started_at).num_seconds();
    Json(json!({
        "ok": true,
        "status": "healthy",
        "uptimeSecs": uptime,
        "onlineUsers": stats.online_users,
        "sessions": stats.sessions,
    }))
}
