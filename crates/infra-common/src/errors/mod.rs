//! Error types shared across the SkyRelay crates

pub mod context;
pub mod types;
