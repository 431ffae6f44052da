//! Simulated digital I/O bank.
//!
//! Unlike the other simulators, channel operations are synchronous and
//! take `&self` (interior mutability), matching the `DigitalIoLink`
//! contract — one handle is shared between the facade and the tower-lamp
//! actor thread.

use fts_common::links::{DigitalIoLink, LinkError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct DigitalIoState {
    connected: bool,
    outputs: HashMap<u8, bool>,
    inputs: HashMap<u8, bool>,
    connect_calls: u32,
    fail_next_connect: bool,
}

/// Clonable handle to a simulated digital I/O bank.
#[derive(Debug, Clone, Default)]
pub struct SimDigitalIo {
    inner: Arc<Mutex<DigitalIoState>>,
}

impl SimDigitalIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next connect attempt fail.
    pub fn fail_next_connect(&self) {
        self.inner.lock().fail_next_connect = true;
    }

    /// Force a raw input level (test stimulus).
    pub fn set_input(&self, pin: u8, high: bool) {
        self.inner.lock().inputs.insert(pin, high);
    }

    /// Last written level of an output channel, if any.
    pub fn output(&self, pin: u8) -> Option<bool> {
        self.inner.lock().outputs.get(&pin).copied()
    }

    pub fn connect_calls(&self) -> u32 {
        self.inner.lock().connect_calls
    }
}

impl DigitalIoLink for SimDigitalIo {
    fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    async fn connect(&self) -> Result<(), LinkError> {
        let mut state = self.inner.lock();
        state.connect_calls += 1;
        if std::mem::take(&mut state.fail_next_connect) {
            return Err(LinkError::Io(
                "simulated digital I/O connect failure".to_string(),
            ));
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        self.inner.lock().connected = false;
        Ok(())
    }

    fn write_output(&self, pin: u8, high: bool) -> Result<(), LinkError> {
        let mut state = self.inner.lock();
        if !state.connected {
            return Err(LinkError::NotConnected);
        }
        state.outputs.insert(pin, high);
        Ok(())
    }

    fn read_input(&self, pin: u8) -> Result<bool, LinkError> {
        let state = self.inner.lock();
        if !state.connected {
            return Err(LinkError::NotConnected);
        }
        // Absent channels read as inactive.
        Ok(state.inputs.get(&pin).copied().unwrap_or(false))
    }

    fn read_all_inputs(&self) -> Result<HashMap<u8, bool>, LinkError> {
        let state = self.inner.lock();
        if !state.connected {
            return Err(LinkError::NotConnected);
        }
        Ok(state.inputs.clone())
    }

    fn reset_all_outputs(&self) -> Result<(), LinkError> {
        let mut state = self.inner.lock();
        if !state.connected {
            return Err(LinkError::NotConnected);
        }
        for level in state.outputs.values_mut() {
            *level = false;
        }
        Ok(())
    }
}
