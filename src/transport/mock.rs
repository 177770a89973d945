//! Mock transport for testing
//!
//! Scriptable register values and failure injection, so protocol and polling
//! logic can be exercised without a device. Clones share state, letting a
//! test keep a handle while the driver owns another.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::RegisterTransport;
use crate::{RectSrvError, Result};

#[derive(Debug, Default)]
struct MockState {
    registers: HashMap<u16, u16>,
    connected: bool,
    fail_connect: bool,
    fail_reads: bool,
    connect_calls: u32,
    close_calls: u32,
    read_calls: u32,
}

/// Mock register transport with shared scriptable state
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock preloaded with register values
    pub fn with_registers(registers: &[(u16, u16)]) -> Self {
        let mock = Self::new();
        for (address, value) in registers {
            mock.set_register(*address, *value);
        }
        mock
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_register(&self, address: u16, value: u16) {
        self.lock().registers.insert(address, value);
    }

    pub fn remove_register(&self, address: u16) {
        self.lock().registers.remove(&address);
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    pub fn connect_calls(&self) -> u32 {
        self.lock().connect_calls
    }

    pub fn close_calls(&self) -> u32 {
        self.lock().close_calls
    }

    pub fn read_calls(&self) -> u32 {
        self.lock().read_calls
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }
}

#[async_trait]
impl RegisterTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn connect(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.connect_calls += 1;
        if state.fail_connect {
            return Err(RectSrvError::connection("mock connection refused"));
        }
        state.connected = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.close_calls += 1;
        state.connected = false;
        Ok(())
    }

    async fn read_register(&mut self, address: u16) -> Result<u16> {
        let mut state = self.lock();
        state.read_calls += 1;
        if !state.connected {
            return Err(RectSrvError::not_connected());
        }
        if state.fail_reads {
            return Err(RectSrvError::io(format!(
                "mock read error at register {address}"
            )));
        }
        state.registers.get(&address).copied().ok_or_else(|| {
            RectSrvError::protocol(format!("no mock value for register {address}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_scripted_reads() {
        let mut transport = MockTransport::with_registers(&[(0, 100), (2, 50)]);
        transport.connect().await.unwrap();
        assert_eq!(transport.read_register(0).await.unwrap(), 100);
        assert_eq!(transport.read_register(2).await.unwrap(), 50);
        assert!(transport.read_register(4).await.is_err());
        assert_eq!(transport.read_calls(), 3);
    }

    #[tokio::test]
    async fn test_mock_failure_injection() {
        let mut transport = MockTransport::with_registers(&[(0, 100)]);
        transport.set_fail_connect(true);
        assert!(transport.connect().await.is_err());

        transport.set_fail_connect(false);
        transport.connect().await.unwrap();
        transport.set_fail_reads(true);
        assert!(transport.read_register(0).await.is_err());

        transport.set_fail_reads(false);
        assert_eq!(transport.read_register(0).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let handle = MockTransport::new();
        let mut owned = handle.clone();
        handle.set_register(6, 1);
        owned.connect().await.unwrap();
        assert!(handle.is_connected());
        assert_eq!(owned.read_register(6).await.unwrap(), 1);
    }
}
