//! Safety sensor descriptors and alert types.
//!
//! A safety alert is plain data handed to the fan-out path (log, GUI
//! popup, tower lamp) — it is never raised as an error.

use serde::{Deserialize, Serialize};

/// Wiring convention of a safety sensor contact.
///
/// Determines how the raw digital level maps to the logical
/// "safe condition satisfied" boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactType {
    /// Normally open: logical = raw.
    A,
    /// Normally closed: logical = !raw.
    B,
}

impl ContactType {
    /// Map a raw input level to the logical safe/unsafe boolean.
    #[inline]
    pub const fn logical(&self, raw: bool) -> bool {
        match self {
            Self::A => raw,
            Self::B => !raw,
        }
    }
}

/// Signal edge the sensor's interrupt wiring is configured for.
///
/// Wiring metadata only — the evaluator works on level snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeType {
    Rising,
    Falling,
}

/// The three monitored safety sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// Operator access door.
    Door,
    /// DUT clamp fixture.
    Clamp,
    /// Chain conveyor interlock.
    Chain,
}

impl SensorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Door => "door",
            Self::Clamp => "clamp",
            Self::Chain => "chain",
        }
    }

    /// The specific violation raised when only this sensor fails.
    pub const fn violation(&self) -> ViolationType {
        match self {
            Self::Door => ViolationType::DoorOpen,
            Self::Clamp => ViolationType::ClampNotEngaged,
            Self::Chain => ViolationType::ChainNotReady,
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One safety sensor channel descriptor (from hardware config).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SafetySensor {
    /// Digital input channel number.
    pub pin: u8,
    /// NC/NO wiring convention.
    pub contact: ContactType,
    /// Interrupt edge wiring.
    pub edge: EdgeType,
}

/// Classified safety violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationType {
    DoorOpen,
    ClampNotEngaged,
    ChainNotReady,
    /// More than one sensor failed at once.
    MultipleSensors,
    /// Explicit operator emergency stop.
    EmergencyStop,
}

impl ViolationType {
    /// Fixed severity per violation type.
    ///
    /// Types without an explicit mapping fall back to `Warning`.
    pub const fn level(&self) -> AlertLevel {
        match self {
            Self::DoorOpen | Self::ClampNotEngaged | Self::ChainNotReady => AlertLevel::Critical,
            Self::EmergencyStop => AlertLevel::Emergency,
            Self::MultipleSensors => AlertLevel::Warning,
        }
    }
}

/// Alert severity, in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AlertLevel {
    Warning,
    Critical,
    Emergency,
}

impl AlertLevel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Emergency => "EMERGENCY",
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified safety violation, created fresh per occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyAlert {
    pub violation: ViolationType,
    pub level: AlertLevel,
    /// English operator message.
    pub title: String,
    pub message: String,
    /// Localized (Korean) operator message.
    pub title_ko: String,
    pub message_ko: String,
    /// Sensors whose logical state failed.
    pub affected_sensors: Vec<SensorKind>,
}

impl SafetyAlert {
    /// Build the alert for a violation and the sensors that caused it.
    pub fn for_violation(violation: ViolationType, affected: Vec<SensorKind>) -> Self {
        let (title, message, title_ko, message_ko) = match violation {
            ViolationType::DoorOpen => (
                "Safety door open".to_string(),
                "Close and latch the safety door before starting the test.".to_string(),
                "안전 도어 열림".to_string(),
                "테스트 시작 전 안전 도어를 닫고 잠그십시오.".to_string(),
            ),
            ViolationType::ClampNotEngaged => (
                "Clamp not engaged".to_string(),
                "Engage the DUT clamp fixture before starting the test.".to_string(),
                "클램프 미체결".to_string(),
                "테스트 시작 전 클램프를 체결하십시오.".to_string(),
            ),
            ViolationType::ChainNotReady => (
                "Chain conveyor not ready".to_string(),
                "Wait for the chain conveyor interlock before starting the test.".to_string(),
                "체인 컨베이어 미준비".to_string(),
                "체인 컨베이어 인터록 준비를 기다리십시오.".to_string(),
            ),
            ViolationType::MultipleSensors => {
                let names: Vec<&str> = affected.iter().map(|s| s.as_str()).collect();
                let list = names.join(", ");
                (
                    "Multiple safety sensors failed".to_string(),
                    format!("Failed sensors: {list}. Resolve all before starting the test."),
                    "다수 안전 센서 이상".to_string(),
                    format!("이상 센서: {list}. 모두 해결한 후 테스트를 시작하십시오."),
                )
            }
            ViolationType::EmergencyStop => (
                "Emergency stop activated".to_string(),
                "Release the emergency stop and clear the error to continue.".to_string(),
                "비상 정지 작동".to_string(),
                "비상 정지를 해제하고 오류를 초기화하십시오.".to_string(),
            ),
        };

        Self {
            violation,
            level: violation.level(),
            title,
            message,
            title_ko,
            message_ko,
            affected_sensors: affected,
        }
    }

    /// Dedicated alert for the operator emergency-stop path.
    pub fn emergency_stop() -> Self {
        Self::for_violation(ViolationType::EmergencyStop, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_type_logical_mapping() {
        assert!(ContactType::A.logical(true));
        assert!(!ContactType::A.logical(false));
        assert!(!ContactType::B.logical(true));
        assert!(ContactType::B.logical(false));
    }

    #[test]
    fn violation_severity_table() {
        assert_eq!(ViolationType::DoorOpen.level(), AlertLevel::Critical);
        assert_eq!(ViolationType::ClampNotEngaged.level(), AlertLevel::Critical);
        assert_eq!(ViolationType::ChainNotReady.level(), AlertLevel::Critical);
        assert_eq!(ViolationType::EmergencyStop.level(), AlertLevel::Emergency);
        assert_eq!(ViolationType::MultipleSensors.level(), AlertLevel::Warning);
    }

    #[test]
    fn multiple_sensor_alert_lists_all_failed() {
        let alert = SafetyAlert::for_violation(
            ViolationType::MultipleSensors,
            vec![SensorKind::Door, SensorKind::Clamp],
        );
        assert!(alert.message.contains("door"));
        assert!(alert.message.contains("clamp"));
        assert!(!alert.message.contains("chain"));
        assert_eq!(alert.affected_sensors.len(), 2);
    }

    #[test]
    fn alert_carries_localized_text() {
        let alert = SafetyAlert::for_violation(ViolationType::DoorOpen, vec![SensorKind::Door]);
        assert!(!alert.title_ko.is_empty());
        assert!(!alert.message_ko.is_empty());
    }
}
