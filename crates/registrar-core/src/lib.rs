//! # SkyRelay Registrar-Core
//!
//! The presence directory for the signalling relay. It answers one question:
//! *is this user reachable right now, and how do events get to them?*
//!
//! A user is reachable either over a **push** channel (a live WebSocket,
//! represented by an unbounded sender feeding the socket's writer task) or
//! over a **poll** channel (a FIFO of buffered events drained by
//! `GET /api/poll`).
//!
//! ```rust
//! use skyrelay_registrar_core::{PresenceDirectory, UserId};
//!
//! let directory: PresenceDirectory<String> = PresenceDirectory::new(None);
//! let bob = UserId::from("2");
//!
//! let queue = directory.ensure_poll(&bob).expect("bob has no socket");
//! queue.push("incomingCall".to_string()).unwrap();
//!
//! assert_eq!(directory.poll(&bob).unwrap(), vec!["incomingCall".to_string()]);
//! assert!(directory.poll(&bob).unwrap().is_empty());
//! ```

pub mod error;
pub mod presence;
pub mod types;

pub use error::{RegistrarError, Result};
pub use presence::{DeliveryHandle, EventQueue, PresenceDirectory};
pub use types::{ConnectionId, DeliveryMode, EndpointInfo, UserId};
