//! HTTP surface: REST polling, account endpoints and the WebSocket channel
//!
//! Both delivery transports end in the same [`SignallingCoordinator`], so a
//! REST client and a socket client can call each other.

pub mod messages;
pub mod rest;
pub mod users;
pub mod ws;

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use skyrelay_users_core::AuthenticationService;

use crate::coordinator::SignallingCoordinator;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: SignallingCoordinator,
    pub users: Arc<AuthenticationService>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(coordinator: SignallingCoordinator, users: AuthenticationService) -> Self {
        Self {
            coordinator,
            users: Arc::new(users),
            started_at: Utc::now(),
        }
    }
}

/// Build the application router. `static_dir`, when given, is served for
/// every path no API route claims.
pub fn create_router(state: AppState, static_dir: Option<&Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/poll", get(rest::poll))
        .route("/call/start", post(rest::start_call))
        .route("/call/candidate", post(rest::candidate))
        .route("/call/answer", post(rest::answer))
        .route("/call/end", post(rest::end_call))
        .route("/call/group", post(rest::group_call))
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/logout", post(users::logout))
        .route("/search_users", get(users::search_users));

    let mut app = Router::new()
        .route("/health", get(rest::health))
        .route("/ws", get(ws::ws_handler))
        .nest("/api", api);

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
    }

    app.layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
