//! Simulated programmable power supply.

use fts_common::links::{LinkError, PowerLink};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct PowerState {
    connected: bool,
    voltage: f64,
    current: f64,
    current_limit: f64,
    output_enabled: bool,
    connect_calls: u32,
    disable_calls: u32,
    fail_next_connect: bool,
}

/// Clonable handle to a simulated power supply link.
#[derive(Debug, Clone, Default)]
pub struct SimPowerSupply {
    inner: Arc<Mutex<PowerState>>,
}

impl SimPowerSupply {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next connect attempt fail.
    pub fn fail_next_connect(&self) {
        self.inner.lock().fail_next_connect = true;
    }

    pub fn voltage(&self) -> f64 {
        self.inner.lock().voltage
    }

    pub fn current(&self) -> f64 {
        self.inner.lock().current
    }

    pub fn current_limit(&self) -> f64 {
        self.inner.lock().current_limit
    }

    pub fn is_output_enabled(&self) -> bool {
        self.inner.lock().output_enabled
    }

    pub fn connect_calls(&self) -> u32 {
        self.inner.lock().connect_calls
    }

    pub fn disable_calls(&self) -> u32 {
        self.inner.lock().disable_calls
    }

    fn ensure_connected(&self) -> Result<(), LinkError> {
        if self.inner.lock().connected {
            Ok(())
        } else {
            Err(LinkError::NotConnected)
        }
    }
}

impl PowerLink for SimPowerSupply {
    fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    async fn connect(&mut self) -> Result<(), LinkError> {
        let mut state = self.inner.lock();
        state.connect_calls += 1;
        if std::mem::take(&mut state.fail_next_connect) {
            return Err(LinkError::Io("simulated power connect failure".to_string()));
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), LinkError> {
        self.inner.lock().connected = false;
        Ok(())
    }

    async fn set_voltage(&mut self, volts: f64) -> Result<(), LinkError> {
        self.ensure_connected()?;
        debug!(volts, "sim power: voltage set");
        self.inner.lock().voltage = volts;
        Ok(())
    }

    async fn set_current(&mut self, amps: f64) -> Result<(), LinkError> {
        self.ensure_connected()?;
        self.inner.lock().current = amps;
        Ok(())
    }

    async fn set_current_limit(&mut self, amps: f64) -> Result<(), LinkError> {
        self.ensure_connected()?;
        self.inner.lock().current_limit = amps;
        Ok(())
    }

    async fn enable_output(&mut self) -> Result<(), LinkError> {
        self.ensure_connected()?;
        self.inner.lock().output_enabled = true;
        Ok(())
    }

    async fn disable_output(&mut self) -> Result<(), LinkError> {
        self.ensure_connected()?;
        let mut state = self.inner.lock();
        state.output_enabled = false;
        state.disable_calls += 1;
        Ok(())
    }
}
