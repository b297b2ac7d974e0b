//! Shared helpers for the HTTP and WebSocket suites

#![allow(dead_code)]

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use futures::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;

use skyrelay_call_engine::api::messages::ServerFrame;
use skyrelay_call_engine::prelude::*;
use skyrelay_users_core::UsersConfig;

pub async fn app_with(config: SignallingConfig) -> (Router, SignallingCoordinator) {
    let users = skyrelay_users_core::init(UsersConfig::in_memory()).await.unwrap();
    let coordinator = SignallingCoordinator::new(config);
    let app = create_router(AppState::new(coordinator.clone(), users), None);
    (app, coordinator)
}

pub async fn app() -> (Router, SignallingCoordinator) {
    app_with(SignallingConfig::default()).await
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Send one request through the router and decode the JSON reply
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

/// Drain `user`'s poll queue over HTTP
pub async fn poll(app: &Router, user: &str) -> Vec<Value> {
    let (status, body) = send(app, get(&format!("/api/poll?userId={}", user))).await;
    assert_eq!(status, StatusCode::OK, "poll failed: {}", body);
    assert_eq!(body["ok"], true);
    body["events"].as_array().cloned().unwrap_or_default()
}

pub fn event_names(events: &[Value]) -> Vec<String> {
    events
        .iter()
        .map(|e| e["type"].as_str().unwrap_or_default().to_string())
        .collect()
}

pub fn offer() -> Value {
    json!({"type": "offer", "sdp": "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\n"})
}

pub fn answer() -> Value {
    json!({"type": "answer", "sdp": "v=0\r\no=- 2 2 IN IP4 0.0.0.0\r\n"})
}

// ---- WebSocket ----

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Start a relay on an ephemeral port
pub async fn start_server(signalling: SignallingConfig) -> RelayServer {
    let mut config = RelayConfig::default();
    config.server.bind_address = "127.0.0.1:0".parse().unwrap();
    config.signalling = signalling;

    let mut server = RelayServerBuilder::new()
        .with_config(config)
        .with_in_memory_database()
        .build()
        .await
        .unwrap();
    server.start().await.unwrap();
    server
}

pub async fn connect(server: &RelayServer) -> Socket {
    let addr = server.local_addr().unwrap();
    let (socket, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    socket
}

pub async fn emit(socket: &mut Socket, event: &str, data: Value) {
    let frame = json!({"event": event, "data": data});
    socket.send(Message::Text(frame.to_string())).await.unwrap();
}

/// Connect and register as `user`, waiting until the relay has seen it
pub async fn connect_as(server: &RelayServer, user: &str) -> Socket {
    let mut socket = connect(server).await;
    emit(&mut socket, "registerSocket", json!({"userId": user})).await;
    let coordinator = server.coordinator().clone();
    let user = UserId::from(user);
    wait_until(|| {
        coordinator
            .directory()
            .info(&user)
            .is_some_and(|info| info.mode == skyrelay_registrar_core::DeliveryMode::Push)
    })
    .await;
    socket
}

/// Next server frame, failing the test after a few seconds
pub async fn next_frame(socket: &mut Socket) -> ServerFrame {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Assert no frame arrives for a short while
pub async fn expect_silence(socket: &mut Socket) {
    let result = tokio::time::timeout(Duration::from_millis(200), socket.next()).await;
    assert!(result.is_err(), "unexpected frame: {:?}", result);
}

pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..250 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}
