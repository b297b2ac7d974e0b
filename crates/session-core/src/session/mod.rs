//! Per-call session state

pub mod session;

pub use session::{Departure, Session};
