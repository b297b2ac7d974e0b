//! # SkyRelay Call Engine
//!
//! The signalling relay proper: it wires the presence directory
//! (`skyrelay-registrar-core`) and the call-session tracker
//! (`skyrelay-session-core`) together behind a transport-agnostic
//! [`SignallingCoordinator`], and exposes it over two equivalent
//! transports served by one axum application:
//!
//! - **REST polling**: `GET /api/poll` drains buffered events;
//!   `POST /api/call/*` sends call-control.
//! - **WebSocket push**: `GET /ws`, JSON frames `{"event", "data"}`.
//!
//! The relay forwards offers, answers and ICE candidates between browsers.
//! It never inspects or carries media.
//!
//! ## Modules
//!
//! - [`router`]: event delivery through the presence directory
//! - [`coordinator`]: user-addressed call-control and the maintenance sweep
//! - [`api`]: REST, account and WebSocket handlers
//! - [`server`]: listener and background-task lifecycle
//! - [`config`]: layered configuration

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod router;
pub mod server;

pub use config::RelayConfig;
pub use coordinator::{SignallingCoordinator, SweepReport};
pub use error::{CallEngineError, Result};
pub use router::{OfflinePolicy, SignallingRouter};
pub use server::{RelayServer, RelayServerBuilder};

/// Commonly used items
pub mod prelude {
    pub use crate::api::{AppState, create_router};
    pub use crate::config::{LogSettings, RelayConfig, ServerConfig, SignallingConfig};
    pub use crate::coordinator::{SignallingCoordinator, SweepReport};
    pub use crate::error::{CallEngineError, Result};
    pub use crate::router::{OfflinePolicy, SignallingRouter};
    pub use crate::server::{RelayServer, RelayServerBuilder};

    pub use skyrelay_registrar_core::UserId;
    pub use skyrelay_session_core::{
        Candidate, EndReason, GroupEndPolicy, SessionDescription, SessionId, SignallingEvent,
    };
}
