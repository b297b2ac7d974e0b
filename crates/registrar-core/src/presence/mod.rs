//! Presence tracking: user id → delivery channel

pub mod handle;
pub mod queue;
pub mod store;

pub use handle::DeliveryHandle;
pub use queue::EventQueue;
pub use store::PresenceDirectory;
