// Wire-level types and codec seam
pub mod entry;

// Domain layer
pub mod connection;
pub mod service;

// Supporting modules
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

pub use error::{ApnsError, Result};
