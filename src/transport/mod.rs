//! Register transport layer
//!
//! Abstracts single-register access behind a trait so the register access
//! layer and the polling state machine can be exercised without a live
//! device. The production implementation speaks Modbus TCP.

use async_trait::async_trait;
use std::fmt;

use crate::Result;

pub mod mock;
pub mod modbus;

pub use mock::MockTransport;
pub use modbus::ModbusTcpTransport;

/// Single-register transport to the device.
///
/// Callers serialize access externally; implementations are not required to
/// tolerate concurrent operations. `Send` suffices: the driver keeps the
/// transport behind a `tokio::sync::Mutex`, which is `Sync` for any `Send`
/// contents.
#[async_trait]
pub trait RegisterTransport: Send + fmt::Debug {
    /// Transport name for log messages
    fn name(&self) -> &str;

    /// Establish the session. Returns a `ConnectionError` if the endpoint
    /// rejects the session.
    async fn connect(&mut self) -> Result<()>;

    /// Tear down the session. Implementations release resources even when
    /// the remote end is already gone.
    async fn close(&mut self) -> Result<()>;

    /// Read one 16-bit holding register
    async fn read_register(&mut self, address: u16) -> Result<u16>;
}
