//! Register access layer for the rectifier
//!
//! Owns the transport session and converts raw register values into physical
//! units. `read_reading` is total: any failure while assembling the four
//! values becomes an error-tagged [`Reading`] instead of an error return, so
//! the polling loop can apply uniform failure counting. The one exception is
//! calling it while disconnected, which is a caller-side lifecycle violation
//! and is surfaced as a `ConnectionError`.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::ScalingConfig;
use crate::transport::RegisterTransport;
use crate::types::Reading;
use crate::{RectSrvError, Result};

/// Holding register addresses on the rectifier
pub const REG_ACTUAL_VOLTAGE: u16 = 0;
pub const REG_ACTUAL_CURRENT: u16 = 2;
pub const REG_POWER_STATE: u16 = 4;
pub const REG_POLARITY: u16 = 6;

/// Register access layer bound to one device
#[derive(Debug)]
pub struct RectifierDriver {
    /// Exclusive lock per register read keeps wire access serialized
    transport: Mutex<Box<dyn RegisterTransport>>,
    connected: AtomicBool,
    voltage_multiplier: f64,
    current_multiplier: f64,
}

impl RectifierDriver {
    pub fn new(transport: Box<dyn RegisterTransport>, scaling: &ScalingConfig) -> Self {
        Self {
            transport: Mutex::new(transport),
            connected: AtomicBool::new(false),
            voltage_multiplier: scaling.voltage_multiplier,
            current_multiplier: scaling.current_multiplier,
        }
    }

    /// Establish the transport session. Idempotent while already connected.
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        let mut transport = self.transport.lock().await;
        transport.connect().await?;
        self.connected.store(true, Ordering::Release);
        info!("{} session established", transport.name());
        Ok(())
    }

    /// Tear down the transport session. Best effort: the layer is marked
    /// disconnected even if the underlying teardown fails.
    pub async fn close(&self) {
        let mut transport = self.transport.lock().await;
        if let Err(e) = transport.close().await {
            warn!("transport close failed: {e}");
        }
        self.connected.store(false, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn read_register(&self, address: u16) -> Result<u16> {
        let mut transport = self.transport.lock().await;
        transport.read_register(address).await
    }

    /// Read the four status registers and assemble a [`Reading`].
    ///
    /// Total for transport and protocol faults: those come back as an
    /// error-tagged reading. Calling while disconnected returns
    /// `Err(ConnectionError)`.
    pub async fn read_reading(&self) -> Result<Reading> {
        if !self.is_connected() {
            return Err(RectSrvError::not_connected());
        }

        match self.read_all_registers().await {
            Ok(reading) => Ok(reading),
            Err(e) => {
                warn!("reading assembly failed: {e}");
                Ok(Reading::failed(e.to_string()))
            }
        }
    }

    async fn read_all_registers(&self) -> Result<Reading> {
        let voltage_raw = self.read_register(REG_ACTUAL_VOLTAGE).await?;
        let current_raw = self.read_register(REG_ACTUAL_CURRENT).await?;
        let power_raw = self.read_register(REG_POWER_STATE).await?;
        let polarity_raw = self.read_register(REG_POLARITY).await?;

        Ok(Reading::from_registers(
            voltage_raw,
            current_raw,
            power_raw,
            polarity_raw,
            self.voltage_multiplier,
            self.current_multiplier,
        ))
    }
}
