//! Modbus TCP transport implementation

use async_trait::async_trait;
use tokio::time::timeout;
use tokio_modbus::client::{tcp, Client, Context, Reader};
use tokio_modbus::Slave;
use tracing::{debug, info, warn};

use super::RegisterTransport;
use crate::config::RectifierConfig;
use crate::{RectSrvError, Result};

/// Modbus TCP client bound to a single unit identifier.
///
/// Holds at most one session; `connect` while a session exists is a no-op.
/// Read failures drop the session so the next forced reconnect starts clean.
#[derive(Debug)]
pub struct ModbusTcpTransport {
    config: RectifierConfig,
    context: Option<Context>,
}

impl ModbusTcpTransport {
    pub fn new(config: &RectifierConfig) -> Self {
        Self {
            config: config.clone(),
            context: None,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }
}

#[async_trait]
impl RegisterTransport for ModbusTcpTransport {
    fn name(&self) -> &str {
        "modbus-tcp"
    }

    async fn connect(&mut self) -> Result<()> {
        if self.context.is_some() {
            return Ok(());
        }

        let endpoint = self.endpoint();
        debug!("connecting to Modbus TCP endpoint {endpoint}");

        let socket_addr = tokio::net::lookup_host(&endpoint)
            .await
            .map_err(|e| RectSrvError::connection(format!("failed to resolve {endpoint}: {e}")))?
            .next()
            .ok_or_else(|| RectSrvError::connection(format!("no address for {endpoint}")))?;

        let slave = Slave(self.config.unit_id);
        match timeout(self.config.timeout, tcp::connect_slave(socket_addr, slave)).await {
            Ok(Ok(context)) => {
                self.context = Some(context);
                info!("connected to Modbus TCP endpoint {endpoint}");
                Ok(())
            }
            Ok(Err(e)) => Err(RectSrvError::connection(format!(
                "failed to connect to {endpoint}: {e}"
            ))),
            Err(_) => Err(RectSrvError::timeout(format!(
                "connection to {endpoint} timed out after {:?}",
                self.config.timeout
            ))),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut context) = self.context.take() {
            if let Err(e) = context.disconnect().await {
                warn!("error during Modbus disconnect: {e}");
            }
            info!("disconnected from Modbus TCP endpoint {}", self.endpoint());
        }
        Ok(())
    }

    async fn read_register(&mut self, address: u16) -> Result<u16> {
        let context = self
            .context
            .as_mut()
            .ok_or_else(RectSrvError::not_connected)?;

        match timeout(self.config.timeout, context.read_holding_registers(address, 1)).await {
            Ok(Ok(Ok(words))) => words.first().copied().ok_or_else(|| {
                RectSrvError::protocol(format!("empty reply for register {address}"))
            }),
            Ok(Ok(Err(exception))) => Err(RectSrvError::protocol(format!(
                "Modbus exception at register {address}: {exception}"
            ))),
            Ok(Err(e)) => {
                // Session is likely broken; drop it so the forced reconnect
                // path re-establishes from scratch.
                self.context = None;
                Err(RectSrvError::io(format!(
                    "Modbus read error at register {address}: {e}"
                )))
            }
            Err(_) => Err(RectSrvError::timeout(format!(
                "read of register {address} timed out after {:?}",
                self.config.timeout
            ))),
        }
    }
}
