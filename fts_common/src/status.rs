//! System status and robot state enums.
//!
//! `SystemStatus` drives the tower-lamp pattern and is owned by the
//! industrial safety manager; `RobotState` is tracked by the orchestration
//! facade and mutated only around motion calls.

use serde::{Deserialize, Serialize};

/// Global system status shown on the tower lamp.
///
/// Transitions are only ever driven by an explicit status-set call; there
/// are no timeout-based transitions. Every "cleared" state requires an
/// explicit operator clear action, and pass/fail states persist until the
/// next test start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemStatus {
    /// Station powered and idle.
    SystemIdle,
    /// A test run is in progress.
    SystemRunning,
    /// Last test passed.
    TestPass,
    /// Last test failed.
    TestFail,
    /// Unrecoverable test/system error.
    SystemError,
    /// Operator acknowledged a system error.
    TestErrorCleared,
    /// Emergency stop is latched.
    EmergencyStop,
    /// Operator acknowledged the emergency stop.
    EmergencyCleared,
    /// A safety sensor violation is active.
    SafetyViolation,
    /// Operator acknowledged the safety violation.
    SafetyCleared,
}

impl SystemStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SystemIdle => "SYSTEM_IDLE",
            Self::SystemRunning => "SYSTEM_RUNNING",
            Self::TestPass => "TEST_PASS",
            Self::TestFail => "TEST_FAIL",
            Self::SystemError => "SYSTEM_ERROR",
            Self::TestErrorCleared => "TEST_ERROR_CLEARED",
            Self::EmergencyStop => "EMERGENCY_STOP",
            Self::EmergencyCleared => "EMERGENCY_CLEARED",
            Self::SafetyViolation => "SAFETY_VIOLATION",
            Self::SafetyCleared => "SAFETY_CLEARED",
        }
    }
}

impl std::fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Robot positioner state as tracked by the facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RobotState {
    /// Position not yet established (before homing).
    Unknown,
    /// At the homing reference position.
    Home,
    /// A motion command is in flight.
    Moving,
    /// At the configured initial (park) position.
    InitialPosition,
    /// At a measurement stroke position.
    MeasurementPosition,
    /// At the maximum configured stroke position.
    MaxStroke,
}
