//! Simulated heater/cooler MCU.
//!
//! The simulated temperature follows the last commanded setpoint, so the
//! standard heating/cooling sequences verify successfully. Tests can
//! script explicit readback values to exercise the retry path.

use fts_common::links::{LinkError, McuLink};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
struct McuState {
    connected: bool,
    temperature: f64,
    standby_target: f64,
    upper_temperature: f64,
    fan_speed: f64,
    test_mode: bool,
    boot_delay: Duration,
    scripted_temperatures: VecDeque<f64>,
    temperature_reads: u32,
    connect_calls: u32,
    fail_next_connect: bool,
}

/// Clonable handle to a simulated MCU link.
#[derive(Debug, Clone)]
pub struct SimMcu {
    inner: Arc<Mutex<McuState>>,
}

impl SimMcu {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(McuState {
                connected: false,
                temperature: 25.0,
                standby_target: 25.0,
                upper_temperature: 0.0,
                fan_speed: 0.0,
                test_mode: false,
                boot_delay: Duration::from_millis(10),
                scripted_temperatures: VecDeque::new(),
                temperature_reads: 0,
                connect_calls: 0,
                fail_next_connect: false,
            })),
        }
    }

    /// Simulated boot-complete latency.
    pub fn with_boot_delay(self, delay: Duration) -> Self {
        self.inner.lock().boot_delay = delay;
        self
    }

    /// Make the next connect attempt fail.
    pub fn fail_next_connect(&self) {
        self.inner.lock().fail_next_connect = true;
    }

    /// Queue explicit readback values; while non-empty they override the
    /// setpoint-following temperature.
    pub fn script_temperatures(&self, values: impl IntoIterator<Item = f64>) {
        self.inner.lock().scripted_temperatures.extend(values);
    }

    pub fn temperature_reads(&self) -> u32 {
        self.inner.lock().temperature_reads
    }

    pub fn connect_calls(&self) -> u32 {
        self.inner.lock().connect_calls
    }

    pub fn upper_temperature(&self) -> f64 {
        self.inner.lock().upper_temperature
    }

    pub fn fan_speed(&self) -> f64 {
        self.inner.lock().fan_speed
    }

    pub fn is_in_test_mode(&self) -> bool {
        self.inner.lock().test_mode
    }

    fn ensure_connected(&self) -> Result<(), LinkError> {
        if self.inner.lock().connected {
            Ok(())
        } else {
            Err(LinkError::NotConnected)
        }
    }
}

impl Default for SimMcu {
    fn default() -> Self {
        Self::new()
    }
}

impl McuLink for SimMcu {
    fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    async fn connect(&mut self) -> Result<(), LinkError> {
        let mut state = self.inner.lock();
        state.connect_calls += 1;
        if std::mem::take(&mut state.fail_next_connect) {
            return Err(LinkError::Io("simulated MCU connect failure".to_string()));
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), LinkError> {
        self.inner.lock().connected = false;
        Ok(())
    }

    async fn set_operating_temperature(&mut self, celsius: f64) -> Result<(), LinkError> {
        self.ensure_connected()?;
        debug!(celsius, "sim mcu: operating temperature set");
        self.inner.lock().temperature = celsius;
        Ok(())
    }

    async fn set_upper_temperature(&mut self, celsius: f64) -> Result<(), LinkError> {
        self.ensure_connected()?;
        self.inner.lock().upper_temperature = celsius;
        Ok(())
    }

    async fn set_fan_speed(&mut self, percent: f64) -> Result<(), LinkError> {
        self.ensure_connected()?;
        self.inner.lock().fan_speed = percent;
        Ok(())
    }

    async fn start_standby_heating(
        &mut self,
        activation: f64,
        standby: f64,
    ) -> Result<(), LinkError> {
        self.ensure_connected()?;
        debug!(activation, standby, "sim mcu: standby heating");
        let mut state = self.inner.lock();
        state.standby_target = standby;
        state.temperature = activation;
        Ok(())
    }

    async fn start_standby_cooling(&mut self) -> Result<(), LinkError> {
        self.ensure_connected()?;
        let mut state = self.inner.lock();
        state.temperature = state.standby_target;
        debug!(target = state.standby_target, "sim mcu: standby cooling");
        Ok(())
    }

    async fn get_temperature(&mut self) -> Result<f64, LinkError> {
        self.ensure_connected()?;
        let mut state = self.inner.lock();
        state.temperature_reads += 1;
        Ok(state
            .scripted_temperatures
            .pop_front()
            .unwrap_or(state.temperature))
    }

    async fn wait_boot_complete(&mut self) -> Result<(), LinkError> {
        self.ensure_connected()?;
        let delay = self.inner.lock().boot_delay;
        tokio::time::sleep(delay).await;
        Ok(())
    }

    async fn set_test_mode(&mut self) -> Result<(), LinkError> {
        self.ensure_connected()?;
        self.inner.lock().test_mode = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn temperature_follows_setpoints() {
        let mut mcu = SimMcu::new();
        mcu.connect().await.unwrap();

        mcu.set_operating_temperature(60.0).await.unwrap();
        assert_eq!(mcu.get_temperature().await.unwrap(), 60.0);

        mcu.start_standby_heating(45.0, 35.0).await.unwrap();
        assert_eq!(mcu.get_temperature().await.unwrap(), 45.0);

        mcu.start_standby_cooling().await.unwrap();
        assert_eq!(mcu.get_temperature().await.unwrap(), 35.0);
    }

    #[tokio::test]
    async fn scripted_readbacks_take_priority() {
        let mut mcu = SimMcu::new();
        mcu.connect().await.unwrap();
        mcu.set_operating_temperature(60.0).await.unwrap();
        mcu.script_temperatures([65.0, 65.0]);

        assert_eq!(mcu.get_temperature().await.unwrap(), 65.0);
        assert_eq!(mcu.get_temperature().await.unwrap(), 65.0);
        // Script exhausted — back to setpoint-following.
        assert_eq!(mcu.get_temperature().await.unwrap(), 60.0);
        assert_eq!(mcu.temperature_reads(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn boot_complete_after_configured_delay() {
        let mut mcu = SimMcu::new().with_boot_delay(Duration::from_secs(2));
        mcu.connect().await.unwrap();
        let before = tokio::time::Instant::now();
        mcu.wait_boot_complete().await.unwrap();
        assert_eq!(before.elapsed(), Duration::from_secs(2));
    }
}
