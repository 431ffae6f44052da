//! Simulated load cell.

use fts_common::links::{LinkError, LoadCellLink};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug)]
struct LoadCellState {
    connected: bool,
    scripted_forces: VecDeque<f64>,
    default_force: f64,
    reads: u32,
    connect_calls: u32,
    fail_next_connect: bool,
}

/// Clonable handle to a simulated load cell link.
#[derive(Debug, Clone)]
pub struct SimLoadCell {
    inner: Arc<Mutex<LoadCellState>>,
}

impl SimLoadCell {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(LoadCellState {
                connected: false,
                scripted_forces: VecDeque::new(),
                default_force: 12.5,
                reads: 0,
                connect_calls: 0,
                fail_next_connect: false,
            })),
        }
    }

    /// Constant readback used once any scripted values are exhausted.
    pub fn with_default_force(self, newtons: f64) -> Self {
        self.inner.lock().default_force = newtons;
        self
    }

    /// Queue explicit peak-force readbacks, consumed in order.
    pub fn push_forces(&self, values: impl IntoIterator<Item = f64>) {
        self.inner.lock().scripted_forces.extend(values);
    }

    /// Make the next connect attempt fail.
    pub fn fail_next_connect(&self) {
        self.inner.lock().fail_next_connect = true;
    }

    pub fn reads(&self) -> u32 {
        self.inner.lock().reads
    }

    pub fn connect_calls(&self) -> u32 {
        self.inner.lock().connect_calls
    }
}

impl Default for SimLoadCell {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadCellLink for SimLoadCell {
    fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    async fn connect(&mut self) -> Result<(), LinkError> {
        let mut state = self.inner.lock();
        state.connect_calls += 1;
        if std::mem::take(&mut state.fail_next_connect) {
            return Err(LinkError::Io(
                "simulated load cell connect failure".to_string(),
            ));
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), LinkError> {
        self.inner.lock().connected = false;
        Ok(())
    }

    async fn read_peak_force(&mut self) -> Result<f64, LinkError> {
        let mut state = self.inner.lock();
        if !state.connected {
            return Err(LinkError::NotConnected);
        }
        state.reads += 1;
        let force = state
            .scripted_forces
            .pop_front()
            .unwrap_or(state.default_force);
        Ok(force)
    }
}
