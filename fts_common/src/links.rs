//! Hardware link traits consumed by the orchestration facade.
//!
//! One trait per link kind. The facade depends only on these contracts;
//! `fts_hal` provides a simulation implementation of each, production
//! drivers live outside this workspace.
//!
//! # Lifecycle
//!
//! 1. `connect()` - establish the transport (serial/TCP/local bus)
//! 2. device operations - only valid while connected
//! 3. `disconnect()` - release the transport
//!
//! Every state-changing device command on the wire is followed by a
//! device-specific settle delay before the next command may be issued.
//! That discipline is owned by the *caller* (the facade's stabilization
//! waits), not by the link implementations.
//!
//! `DigitalIoLink` is the one exception to the `&mut self` ownership
//! model: its channel operations are synchronous `&self` calls with
//! interior thread-safety, so a single handle can be shared (via `Arc`)
//! between the facade and the tower-lamp actor thread.

// The facade runs on a current-thread scheduler; link futures are
// awaited in place and never need Send bounds.
#![allow(async_fn_in_trait)]

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Error type for link transport and device operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LinkError {
    /// Operation attempted while the link is not connected.
    #[error("link not connected")]
    NotConnected,

    /// Device did not answer within its protocol deadline.
    #[error("device timeout: {0}")]
    Timeout(String),

    /// Malformed or unexpected device response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Transport-level I/O failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Cooperative cancellation observed mid-operation.
    #[error("operation cancelled")]
    Cancelled,
}

/// Names the five hardware links for status snapshots and error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkName {
    Robot,
    Mcu,
    Power,
    LoadCell,
    DigitalIo,
}

impl LinkName {
    /// All links, in connection-report order.
    pub const ALL: [LinkName; 5] = [
        LinkName::Robot,
        LinkName::Mcu,
        LinkName::Power,
        LinkName::LoadCell,
        LinkName::DigitalIo,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Robot => "robot",
            Self::Mcu => "mcu",
            Self::Power => "power",
            Self::LoadCell => "load_cell",
            Self::DigitalIo => "digital_io",
        }
    }
}

impl fmt::Display for LinkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Robot motion controller link.
pub trait RobotLink {
    fn is_connected(&self) -> bool;
    async fn connect(&mut self) -> Result<(), LinkError>;
    async fn disconnect(&mut self) -> Result<(), LinkError>;

    /// Enable the servo loop on the given axis.
    async fn enable_servo(&mut self, axis: u8) -> Result<(), LinkError>;

    /// Run the axis homing procedure to establish the reference position.
    async fn home_axis(&mut self, axis: u8) -> Result<(), LinkError>;

    /// Move the axis to an absolute position [mm].
    async fn move_absolute(&mut self, axis: u8, position: f64) -> Result<(), LinkError>;
}

/// Heater/cooler microcontroller link (drives the LMA subsystem).
pub trait McuLink {
    fn is_connected(&self) -> bool;
    async fn connect(&mut self) -> Result<(), LinkError>;
    async fn disconnect(&mut self) -> Result<(), LinkError>;

    async fn set_operating_temperature(&mut self, celsius: f64) -> Result<(), LinkError>;
    async fn set_upper_temperature(&mut self, celsius: f64) -> Result<(), LinkError>;
    async fn set_fan_speed(&mut self, percent: f64) -> Result<(), LinkError>;

    /// Start standby heating toward the activation/standby temperature pair.
    async fn start_standby_heating(
        &mut self,
        activation: f64,
        standby: f64,
    ) -> Result<(), LinkError>;

    /// Start standby cooling back toward the standby temperature.
    async fn start_standby_cooling(&mut self) -> Result<(), LinkError>;

    /// Read the current DUT-side temperature [°C].
    async fn get_temperature(&mut self) -> Result<f64, LinkError>;

    /// Resolve once the MCU reports boot-complete.
    ///
    /// Unbounded — the caller is responsible for the wall-clock bound.
    async fn wait_boot_complete(&mut self) -> Result<(), LinkError>;

    /// Switch the MCU into test mode.
    async fn set_test_mode(&mut self) -> Result<(), LinkError>;
}

/// Programmable power supply link.
pub trait PowerLink {
    fn is_connected(&self) -> bool;
    async fn connect(&mut self) -> Result<(), LinkError>;
    async fn disconnect(&mut self) -> Result<(), LinkError>;

    async fn set_voltage(&mut self, volts: f64) -> Result<(), LinkError>;
    async fn set_current(&mut self, amps: f64) -> Result<(), LinkError>;
    async fn set_current_limit(&mut self, amps: f64) -> Result<(), LinkError>;
    async fn enable_output(&mut self) -> Result<(), LinkError>;
    async fn disable_output(&mut self) -> Result<(), LinkError>;
}

/// Load cell link.
pub trait LoadCellLink {
    fn is_connected(&self) -> bool;
    async fn connect(&mut self) -> Result<(), LinkError>;
    async fn disconnect(&mut self) -> Result<(), LinkError>;

    /// Read the peak force [N] captured since the last read.
    async fn read_peak_force(&mut self) -> Result<f64, LinkError>;
}

/// Digital I/O link: safety sensors, status lamp, brake release.
///
/// Channel operations are synchronous and take `&self` — implementations
/// must be internally thread-safe so one handle can be shared between the
/// facade and the lamp actor thread.
pub trait DigitalIoLink {
    fn is_connected(&self) -> bool;
    async fn connect(&self) -> Result<(), LinkError>;
    async fn disconnect(&self) -> Result<(), LinkError>;

    /// Drive a digital output channel.
    fn write_output(&self, pin: u8, high: bool) -> Result<(), LinkError>;

    /// Read a single digital input channel.
    fn read_input(&self, pin: u8) -> Result<bool, LinkError>;

    /// Snapshot all digital input channels (channel → raw level).
    fn read_all_inputs(&self) -> Result<HashMap<u8, bool>, LinkError>;

    /// Drive every output channel low.
    fn reset_all_outputs(&self) -> Result<(), LinkError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_name_display() {
        assert_eq!(LinkName::Robot.to_string(), "robot");
        assert_eq!(LinkName::LoadCell.to_string(), "load_cell");
        assert_eq!(LinkName::ALL.len(), 5);
    }

    #[test]
    fn link_error_display() {
        let err = LinkError::Timeout("no ACK within 500ms".to_string());
        assert!(err.to_string().contains("no ACK"));
        assert_eq!(LinkError::NotConnected.to_string(), "link not connected");
    }
}
