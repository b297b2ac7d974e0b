//! WebSocket push transport
//!
//! One reader loop per socket handles inbound frames in order; a writer
//! task drains the socket's event channel. Until the client sends
//! `registerSocket` the socket is anonymous and every other message is
//! ignored.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{Instrument, Level, debug, warn};

use skyrelay_infra_common::LogContext;
use skyrelay_registrar_core::{ConnectionId, UserId};
use skyrelay_session_core::SignallingEvent;

use super::AppState;
use super::messages::{ClientMessage, ServerFrame};
use crate::coordinator::{SignallingCoordinator, log_outcome};

/// `GET /ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state.coordinator))
}

/// The user a socket speaks for, once it has registered
struct Registration {
    user: UserId,
    connection_id: ConnectionId,
}

async fn handle_socket(socket: WebSocket, coordinator: SignallingCoordinator) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<SignallingEvent>();

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let frame = ServerFrame::from(&event);
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Cannot encode {} frame: {}", frame.event, e);
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(text)).await {
                debug!("Socket write failed: {}", e);
                break;
            }
        }
    });

    let mut registration: Option<Registration> = None;

    while let Some(Ok(msg)) = stream.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let message = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(message) => message,
            Err(e) => {
                debug!("Ignoring unparseable frame: {}", e);
                continue;
            }
        };

        if let ClientMessage::RegisterSocket(register) = message {
            if let Some(previous) = registration.take() {
                if previous.user != register.user_id {
                    coordinator.disconnect(&previous.user, previous.connection_id).await;
                }
            }
            if register.user_id.is_empty() {
                warn!("registerSocket without a user id");
                continue;
            }
            let connection_id = coordinator.register_push(register.user_id.clone(), tx.clone());
            registration = Some(Registration {
                user: register.user_id,
                connection_id,
            });
            continue;
        }

        let Some(me) = registration.as_ref().map(|r| r.user.clone()) else {
            debug!("Ignoring {} from unregistered socket", message.name());
            continue;
        };

        let span = LogContext::with_operation("ws", message.name())
            .with_field("user", me.as_str())
            .span(Level::DEBUG);
        handle_message(&coordinator, me, message).instrument(span).await;
    }

    if let Some(registration) = registration {
        coordinator
            .disconnect(&registration.user, registration.connection_id)
            .await;
    }
    drop(tx);
    writer.abort();
}

async fn handle_message(coordinator: &SignallingCoordinator, me: UserId, message: ClientMessage) {
    let name = message.name();
    match message {
        ClientMessage::CallUser(call) => {
            let result = coordinator.call_user(me.clone(), call.to_user_id, call.offer_sdp, call.name).await;
            log_outcome(name, &me, &result);
        }
        ClientMessage::AcceptCall(accept) => {
            let result = coordinator
                .accept_call(me.clone(), accept.caller_user_id, accept.answer_sdp, accept.session_id)
                .await;
            log_outcome(name, &me, &result);
        }
        ClientMessage::IceCandidate(candidate) => {
            let result = coordinator
                .ice_candidate(me.clone(), candidate.to_user_id, candidate.candidate, candidate.session_id)
                .await;
            log_outcome(name, &me, &result);
        }
        ClientMessage::EndCall(end) => {
            let result = coordinator.end_call(me.clone(), end.to_user_id, end.session_id).await;
            log_outcome(name, &me, &result);
        }
        ClientMessage::CreateGroupCall(group) => {
            if group.host_user_id.as_ref().is_some_and(|host| *host != me) {
                warn!("createGroupCall names a different host; using the socket's user {}", me);
            }
            let result = coordinator
                .create_group_call(me.clone(), group.room_name, group.user_ids, group.offer_sdp, group.name)
                .await;
            log_outcome(name, &me, &result);
        }
        ClientMessage::RegisterSocket(_) => {}
    }
}
