//! rectsrv - Rectifier Monitoring Service
//!
//! Polls a single industrial rectifier over Modbus TCP at a fixed cadence,
//! keeps a thread-safe "last known good" snapshot of its operating values and
//! appends every successful reading to a date-partitioned CSV journal.

pub mod api;
pub mod config;
pub mod driver;
pub mod error;
pub mod journal;
pub mod service;
pub mod transport;
pub mod types;

pub use error::{RectSrvError, Result};

/// Service information
pub const SERVICE_NAME: &str = "rectsrv";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
