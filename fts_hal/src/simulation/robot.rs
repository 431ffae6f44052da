//! Simulated robot positioner.

use fts_common::links::{LinkError, RobotLink};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
struct RobotState {
    connected: bool,
    servo_enabled: bool,
    homed: bool,
    position: f64,
    move_delay: Duration,
    connect_calls: u32,
    home_calls: u32,
    move_calls: u32,
    fail_next_connect: bool,
}

/// Clonable handle to a simulated robot motion controller.
#[derive(Debug, Clone)]
pub struct SimRobot {
    inner: Arc<Mutex<RobotState>>,
}

impl SimRobot {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RobotState {
                connected: false,
                servo_enabled: false,
                homed: false,
                position: 0.0,
                move_delay: Duration::ZERO,
                connect_calls: 0,
                home_calls: 0,
                move_calls: 0,
                fail_next_connect: false,
            })),
        }
    }

    /// Simulated motion latency per move command.
    pub fn with_move_delay(self, delay: Duration) -> Self {
        self.inner.lock().move_delay = delay;
        self
    }

    /// Make the next connect attempt fail.
    pub fn fail_next_connect(&self) {
        self.inner.lock().fail_next_connect = true;
    }

    pub fn position(&self) -> f64 {
        self.inner.lock().position
    }

    pub fn is_homed(&self) -> bool {
        self.inner.lock().homed
    }

    pub fn is_servo_enabled(&self) -> bool {
        self.inner.lock().servo_enabled
    }

    pub fn connect_calls(&self) -> u32 {
        self.inner.lock().connect_calls
    }

    pub fn home_calls(&self) -> u32 {
        self.inner.lock().home_calls
    }

    pub fn move_calls(&self) -> u32 {
        self.inner.lock().move_calls
    }

    fn ensure_connected(&self) -> Result<(), LinkError> {
        if self.inner.lock().connected {
            Ok(())
        } else {
            Err(LinkError::NotConnected)
        }
    }
}

impl Default for SimRobot {
    fn default() -> Self {
        Self::new()
    }
}

impl RobotLink for SimRobot {
    fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    async fn connect(&mut self) -> Result<(), LinkError> {
        let mut state = self.inner.lock();
        state.connect_calls += 1;
        if std::mem::take(&mut state.fail_next_connect) {
            return Err(LinkError::Io("simulated robot connect failure".to_string()));
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), LinkError> {
        self.inner.lock().connected = false;
        Ok(())
    }

    async fn enable_servo(&mut self, axis: u8) -> Result<(), LinkError> {
        self.ensure_connected()?;
        debug!(axis, "sim robot: servo enabled");
        self.inner.lock().servo_enabled = true;
        Ok(())
    }

    async fn home_axis(&mut self, axis: u8) -> Result<(), LinkError> {
        self.ensure_connected()?;
        debug!(axis, "sim robot: homing");
        let mut state = self.inner.lock();
        state.home_calls += 1;
        state.homed = true;
        state.position = 0.0;
        Ok(())
    }

    async fn move_absolute(&mut self, axis: u8, position: f64) -> Result<(), LinkError> {
        self.ensure_connected()?;
        let delay = self.inner.lock().move_delay;
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }
        debug!(axis, position, "sim robot: move complete");
        let mut state = self.inner.lock();
        state.move_calls += 1;
        state.position = position;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn move_requires_connection() {
        let mut robot = SimRobot::new();
        assert_eq!(
            robot.move_absolute(1, 10.0).await,
            Err(LinkError::NotConnected)
        );

        robot.connect().await.unwrap();
        robot.move_absolute(1, 10.0).await.unwrap();
        assert_eq!(robot.position(), 10.0);
        assert_eq!(robot.move_calls(), 1);
    }

    #[tokio::test]
    async fn connect_failure_is_one_shot() {
        let mut robot = SimRobot::new();
        robot.fail_next_connect();
        assert!(robot.connect().await.is_err());
        assert!(!robot.is_connected());
        assert!(robot.connect().await.is_ok());
        assert_eq!(robot.connect_calls(), 2);
    }

    #[tokio::test]
    async fn probe_handle_observes_facade_owned_link() {
        let mut robot = SimRobot::new();
        let probe = robot.clone();
        robot.connect().await.unwrap();
        robot.home_axis(1).await.unwrap();
        assert!(probe.is_homed());
        assert_eq!(probe.home_calls(), 1);
    }
}
