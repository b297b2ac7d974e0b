//! # SkyRelay Session-Core
//!
//! Tracks the lifecycle of every call the relay knows about, and decides who
//! has to hear about each transition.
//!
//! ```text
//! initiating ──► offered ──► answered ──► active
//!      │            │           │           │
//!      └────────────┴─────┬─────┴───────────┘
//!                         ▼
//!                       ended
//! ```
//!
//! The tracker never talks to sockets or queues itself. Every outbound
//! message goes through an [`EventDispatcher`], which the relay's router
//! implements on top of the presence directory.
//!
//! Each session sits behind its own lock, so operations on one call never
//! wait for another call.

pub mod errors;
pub mod events;
pub mod session;
pub mod tracker;
pub mod types;

pub use errors::{Result, SessionError};
pub use events::{
    CallAccepted, CallEnded, CallFailed, DispatchOutcome, EventDispatcher, IceCandidate, IncomingCall,
    SignallingEvent,
};
pub use session::Session;
pub use tracker::{CallSessionTracker, SessionRegistry, Started, TrackerStats};
pub use types::{
    CallKind, CallState, Candidate, EndReason, GroupEndPolicy, ParticipantStatus, SessionDescription, SessionId,
};

pub use skyrelay_registrar_core::UserId;
