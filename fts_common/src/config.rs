//! Configuration loading and station/test configuration types.
//!
//! All config types use `serde::Deserialize` for TOML loading. Optional
//! fields carry serde defaults for forward-compatible deserialization.
//! Semantic validation runs after parse and names the offending field.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::error::StationError;
use crate::safety::SafetySensor;

/// Fixed delay between matrix repeats [s].
pub const INTER_CYCLE_DELAY_S: f64 = 1.0;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
/// - Returns `ConfigError::ValidationError` if semantic validation fails
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Semantic validation hook; default accepts everything.
    fn validate(&self) -> Result<(), StationError> {
        Ok(())
    }

    /// Load and validate a configuration file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound);
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        let config: Self =
            toml::from_str(&text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

// ─── Test Configuration ─────────────────────────────────────────────

/// Per-step stabilization delays [s].
///
/// Every state-changing device command is followed by its settle delay
/// before the next command is issued — a hard device contract.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StabilizationDelays {
    /// Generic post-command settle.
    #[serde(default = "default_command_delay")]
    pub command: f64,
    /// After enabling the power supply output.
    #[serde(default = "default_power_on_delay")]
    pub power_on: f64,
    /// After switching the MCU into test mode.
    #[serde(default = "default_mcu_mode_delay")]
    pub mcu_mode: f64,
    /// After a robot motion completes.
    #[serde(default = "default_robot_move_delay")]
    pub robot_move: f64,
    /// Dwell at the operating position during the standby sequence.
    #[serde(default = "default_robot_standby_delay")]
    pub robot_standby: f64,
    /// After starting standby cooling.
    #[serde(default = "default_cooling_delay")]
    pub cooling: f64,
}

fn default_command_delay() -> f64 {
    0.5
}
fn default_power_on_delay() -> f64 {
    1.0
}
fn default_mcu_mode_delay() -> f64 {
    0.5
}
fn default_robot_move_delay() -> f64 {
    0.5
}
fn default_robot_standby_delay() -> f64 {
    2.0
}
fn default_cooling_delay() -> f64 {
    1.0
}

impl Default for StabilizationDelays {
    fn default() -> Self {
        Self {
            command: 0.5,
            power_on: 1.0,
            mcu_mode: 0.5,
            robot_move: 0.5,
            robot_standby: 2.0,
            cooling: 1.0,
        }
    }
}

impl StabilizationDelays {
    fn validate(&self) -> Result<(), StationError> {
        for (field, value) in [
            ("stabilization.command", self.command),
            ("stabilization.power_on", self.power_on),
            ("stabilization.mcu_mode", self.mcu_mode),
            ("stabilization.robot_move", self.robot_move),
            ("stabilization.robot_standby", self.robot_standby),
            ("stabilization.cooling", self.cooling),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(StationError::validation(
                    field,
                    value,
                    "must be a non-negative duration in seconds",
                ));
            }
        }
        Ok(())
    }
}

/// Immutable test run parameters.
///
/// Constructed (or deserialized) once per run and validated before use;
/// [`TestConfiguration::with_overrides`] produces a new validated
/// instance and never mutates the original.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfiguration {
    /// Supply voltage setpoint [V].
    pub voltage: f64,
    /// Supply current setpoint [A].
    pub current: f64,
    /// Safety maximum voltage [V]; must exceed `voltage`.
    pub max_voltage: f64,
    /// Safety maximum current [A]; must exceed `current`.
    pub max_current: f64,

    /// Matrix temperatures, walked in list order [°C].
    pub temperatures: Vec<f64>,
    /// MCU upper-temperature protection setpoint [°C].
    pub upper_temperature: f64,
    /// Safety maximum temperature [°C]; must exceed `upper_temperature`.
    pub max_temperature: f64,
    /// Standby (cool-down) target temperature [°C].
    pub standby_temperature: f64,
    /// Standby-heating activation target temperature [°C].
    pub activation_temperature: f64,

    /// Matrix stroke positions, walked in list order [mm].
    pub stroke_positions: Vec<f64>,
    /// Robot park position between measurements [mm].
    #[serde(default)]
    pub initial_position: f64,
    /// Robot dwell position during the standby sequence [mm].
    #[serde(default = "default_operating_position")]
    pub operating_position: f64,

    #[serde(default)]
    pub stabilization: StabilizationDelays,

    /// Acceptable |actual - expected| band for temperature checks [°C].
    #[serde(default = "default_temperature_tolerance")]
    pub temperature_tolerance: f64,
    /// Number of matrix repeats.
    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,
    /// MCU boot-complete wall-clock bound [s].
    #[serde(default = "default_boot_timeout")]
    pub boot_timeout: f64,
    /// LMA fan speed [%].
    #[serde(default = "default_fan_speed")]
    pub fan_speed_percent: f64,
}

fn default_operating_position() -> f64 {
    50.0
}
fn default_temperature_tolerance() -> f64 {
    1.0
}
fn default_repeat_count() -> u32 {
    1
}
fn default_boot_timeout() -> f64 {
    30.0
}
fn default_fan_speed() -> f64 {
    60.0
}

impl TestConfiguration {
    /// Validate all constraints; the error names the offending field.
    pub fn validate(&self) -> Result<(), StationError> {
        if !self.voltage.is_finite() || self.voltage <= 0.0 {
            return Err(StationError::validation(
                "voltage",
                self.voltage,
                "must be positive",
            ));
        }
        if !self.current.is_finite() || self.current <= 0.0 {
            return Err(StationError::validation(
                "current",
                self.current,
                "must be positive",
            ));
        }
        if self.max_voltage <= self.voltage {
            return Err(StationError::validation(
                "max_voltage",
                self.max_voltage,
                format!("must exceed voltage ({})", self.voltage),
            ));
        }
        if self.max_current <= self.current {
            return Err(StationError::validation(
                "max_current",
                self.max_current,
                format!("must exceed current ({})", self.current),
            ));
        }
        if self.temperatures.is_empty() {
            return Err(StationError::validation(
                "temperatures",
                "[]",
                "must contain at least one temperature",
            ));
        }
        if let Some(&bad) = self.temperatures.iter().find(|t| !t.is_finite() || **t <= 0.0) {
            return Err(StationError::validation(
                "temperatures",
                bad,
                "all temperatures must be positive",
            ));
        }
        if self.max_temperature <= self.upper_temperature {
            return Err(StationError::validation(
                "max_temperature",
                self.max_temperature,
                format!("must exceed upper_temperature ({})", self.upper_temperature),
            ));
        }
        if self.stroke_positions.is_empty() {
            return Err(StationError::validation(
                "stroke_positions",
                "[]",
                "must contain at least one position",
            ));
        }
        if let Some(&bad) = self
            .stroke_positions
            .iter()
            .find(|p| !p.is_finite() || **p < 0.0)
        {
            return Err(StationError::validation(
                "stroke_positions",
                bad,
                "all positions must be non-negative",
            ));
        }
        if self.initial_position < 0.0 {
            return Err(StationError::validation(
                "initial_position",
                self.initial_position,
                "must be non-negative",
            ));
        }
        if self.operating_position < 0.0 {
            return Err(StationError::validation(
                "operating_position",
                self.operating_position,
                "must be non-negative",
            ));
        }
        if !self.temperature_tolerance.is_finite() || self.temperature_tolerance <= 0.0 {
            return Err(StationError::validation(
                "temperature_tolerance",
                self.temperature_tolerance,
                "must be positive",
            ));
        }
        if self.repeat_count == 0 {
            return Err(StationError::validation(
                "repeat_count",
                self.repeat_count,
                "must be at least 1",
            ));
        }
        if !self.boot_timeout.is_finite() || self.boot_timeout <= 0.0 {
            return Err(StationError::validation(
                "boot_timeout",
                self.boot_timeout,
                "must be positive",
            ));
        }
        if !(0.0..=100.0).contains(&self.fan_speed_percent) {
            return Err(StationError::validation(
                "fan_speed_percent",
                self.fan_speed_percent,
                "must be within 0..=100",
            ));
        }
        self.stabilization.validate()
    }

    /// Produce a new validated configuration with the given overrides
    /// applied. The original is never mutated.
    pub fn with_overrides(&self, overrides: TestOverrides) -> Result<Self, StationError> {
        let mut next = self.clone();
        if let Some(voltage) = overrides.voltage {
            next.voltage = voltage;
        }
        if let Some(current) = overrides.current {
            next.current = current;
        }
        if let Some(temperatures) = overrides.temperatures {
            next.temperatures = temperatures;
        }
        if let Some(positions) = overrides.stroke_positions {
            next.stroke_positions = positions;
        }
        if let Some(tolerance) = overrides.temperature_tolerance {
            next.temperature_tolerance = tolerance;
        }
        if let Some(repeat) = overrides.repeat_count {
            next.repeat_count = repeat;
        }
        next.validate()?;
        Ok(next)
    }

    /// Largest configured stroke position [mm].
    pub fn max_stroke(&self) -> f64 {
        self.stroke_positions
            .iter()
            .copied()
            .fold(f64::MIN, f64::max)
    }
}

/// Selective overrides for [`TestConfiguration::with_overrides`].
#[derive(Debug, Clone, Default)]
pub struct TestOverrides {
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub temperatures: Option<Vec<f64>>,
    pub stroke_positions: Option<Vec<f64>>,
    pub temperature_tolerance: Option<f64>,
    pub repeat_count: Option<u32>,
}

// ─── Hardware Configuration ─────────────────────────────────────────

/// Tower lamp and beeper output channels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LampPins {
    pub red: u8,
    pub yellow: u8,
    pub green: u8,
    pub beeper: u8,
}

/// The three safety sensor descriptors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SafetySensors {
    pub door: SafetySensor,
    pub clamp: SafetySensor,
    pub chain: SafetySensor,
}

/// Static channel/axis map, loaded once and read-only for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Robot positioner axis id.
    pub robot_axis_id: u8,
    /// Digital output channel for the brake release solenoid.
    pub brake_release_pin: u8,
    /// Tower lamp channels.
    pub lamp: LampPins,
    /// Safety sensor channels.
    pub safety_sensors: SafetySensors,
}

impl HardwareConfig {
    /// Validate channel assignments (all output pins must be distinct).
    pub fn validate(&self) -> Result<(), StationError> {
        let pins = [
            self.brake_release_pin,
            self.lamp.red,
            self.lamp.yellow,
            self.lamp.green,
            self.lamp.beeper,
        ];
        for (idx, pin) in pins.iter().enumerate() {
            if pins[idx + 1..].contains(pin) {
                return Err(StationError::validation(
                    "lamp",
                    pin,
                    "output pin assigned more than once",
                ));
            }
        }
        Ok(())
    }
}

// ─── Station Configuration ──────────────────────────────────────────

/// Top-level station configuration file: `[test]` + `[hardware]` tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    pub test: TestConfiguration,
    pub hardware: HardwareConfig,
}

impl ConfigLoader for StationConfig {
    fn validate(&self) -> Result<(), StationError> {
        self.test.validate()?;
        self.hardware.validate()
    }
}
