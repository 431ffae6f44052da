//! Industrial safety system manager.
//!
//! Composes the tower-lamp actor and the sensor classifier behind one
//! status-owning manager. Construction is an explicit two-phase
//! lifecycle: [`SafetySystemBuilder::build`] connects the digital I/O
//! link if needed and spawns the lamp actor, returning a ready
//! [`SafetySystem`] — there is no lazy initialization at call sites.

use fts_common::config::HardwareConfig;
use fts_common::error::StationError;
use fts_common::links::{DigitalIoLink, LinkError, LinkName};
use fts_common::safety::{AlertLevel, SafetyAlert, ViolationType};
use fts_common::status::SystemStatus;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::lamp::{LampTiming, TowerLampController};
use super::sensors::SafetySensorSet;

/// GUI popup callback: (title, message, level). Failures are swallowed.
pub type AlertCallback = Box<dyn Fn(&str, &str, AlertLevel) -> Result<(), String> + Send>;

/// Status change observer. Failures are isolated per observer.
pub type StatusObserver = Box<dyn Fn(SystemStatus) -> Result<(), String> + Send>;

/// Builder for the two-phase construct-then-initialize lifecycle.
pub struct SafetySystemBuilder<D> {
    dio: Arc<D>,
    hardware: HardwareConfig,
    timing: LampTiming,
    alert_callback: Option<AlertCallback>,
    observers: Vec<StatusObserver>,
}

impl<D> SafetySystemBuilder<D>
where
    D: DigitalIoLink + Send + Sync + 'static,
{
    pub fn new(dio: Arc<D>, hardware: HardwareConfig) -> Self {
        Self {
            dio,
            hardware,
            timing: LampTiming::default(),
            alert_callback: None,
            observers: Vec::new(),
        }
    }

    /// Override the lamp timer periods (tests use short periods).
    pub fn lamp_timing(mut self, timing: LampTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Attach the GUI popup callback.
    pub fn alert_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, &str, AlertLevel) -> Result<(), String> + Send + 'static,
    {
        self.alert_callback = Some(Box::new(callback));
        self
    }

    /// Register a status observer.
    pub fn observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(SystemStatus) -> Result<(), String> + Send + 'static,
    {
        self.observers.push(Box::new(observer));
        self
    }

    /// Connect the digital I/O link if needed, spawn the lamp actor,
    /// and return a ready system.
    pub async fn build(self) -> Result<SafetySystem<D>, StationError> {
        if !self.dio.is_connected() {
            self.dio.connect().await.map_err(|err| match err {
                LinkError::Cancelled => StationError::Cancelled,
                err => StationError::link(
                    LinkName::DigitalIo,
                    format!("safety system connect failed: {err}"),
                ),
            })?;
        }
        let lamp = TowerLampController::spawn(
            Arc::clone(&self.dio),
            self.hardware.lamp,
            self.timing,
        );
        let sensors = SafetySensorSet::new(&self.hardware.safety_sensors);
        info!("safety system ready");
        Ok(SafetySystem {
            dio: self.dio,
            lamp,
            sensors,
            status: SystemStatus::SystemIdle,
            last_violation: None,
            alert_callback: self.alert_callback,
            observers: self.observers,
        })
    }
}

/// System status owner: lamp transitions, sensor gating, observers.
pub struct SafetySystem<D>
where
    D: DigitalIoLink + Send + Sync + 'static,
{
    dio: Arc<D>,
    lamp: TowerLampController,
    sensors: SafetySensorSet,
    status: SystemStatus,
    /// Last violation observed, for change-only re-triggering.
    last_violation: Option<ViolationType>,
    alert_callback: Option<AlertCallback>,
    observers: Vec<StatusObserver>,
}

impl<D> SafetySystem<D>
where
    D: DigitalIoLink + Send + Sync + 'static,
{
    pub fn builder(dio: Arc<D>, hardware: HardwareConfig) -> SafetySystemBuilder<D> {
        SafetySystemBuilder::new(dio, hardware)
    }

    /// Current system status.
    pub fn status(&self) -> SystemStatus {
        self.status
    }

    /// Force the system into the idle baseline.
    pub fn initialize_system(&mut self) {
        info!("safety system initialized");
        self.set_system_status(SystemStatus::SystemIdle);
    }

    /// Transition the system status: lamp first, then every observer.
    ///
    /// Observer failures are isolated — one bad observer cannot block
    /// the lamp or the remaining observers.
    pub fn set_system_status(&mut self, status: SystemStatus) {
        debug!(%status, "system status transition");
        self.status = status;
        self.lamp.set_status(status);
        for (idx, observer) in self.observers.iter().enumerate() {
            if let Err(reason) = observer(status) {
                warn!(observer = idx, reason, "status observer failed");
            }
        }
    }

    /// Evaluate the sensor snapshot; returns whether all sensors are
    /// currently satisfied.
    ///
    /// A violation is re-triggered only when its type differs from the
    /// last one observed. On resolution the cached violation is cleared
    /// and, only if the current status is SAFETY_VIOLATION, the system
    /// reverts to SYSTEM_IDLE.
    pub fn check_safety_conditions(&mut self, inputs: &HashMap<u8, bool>) -> bool {
        match self.sensors.check(inputs) {
            Some(alert) => {
                if self.last_violation != Some(alert.violation) {
                    self.last_violation = Some(alert.violation);
                    self.trigger_alert(&alert);
                }
                false
            }
            None => {
                if self.last_violation.take().is_some()
                    && self.status == SystemStatus::SafetyViolation
                {
                    self.set_system_status(SystemStatus::SystemIdle);
                }
                true
            }
        }
    }

    /// Gate a test start on the safety check. Transitions to
    /// SYSTEM_RUNNING and returns true only when every sensor is
    /// satisfied; otherwise the status is left untouched by this call.
    pub fn handle_test_start_request(&mut self, inputs: &HashMap<u8, bool>) -> bool {
        if self.check_safety_conditions(inputs) {
            self.set_system_status(SystemStatus::SystemRunning);
            true
        } else {
            false
        }
    }

    /// Latch the emergency stop and raise the dedicated alert.
    pub fn handle_emergency_stop(&mut self) {
        self.set_system_status(SystemStatus::EmergencyStop);
        let alert = SafetyAlert::emergency_stop();
        self.trigger_alert(&alert);
    }

    /// Route a completed (or failed) test to its terminal status.
    ///
    /// There is no automatic return to idle — the operator starts the
    /// next test explicitly.
    pub fn handle_test_completion(&mut self, success: bool, error: Option<&StationError>) {
        let status = if error.is_some() {
            SystemStatus::SystemError
        } else if success {
            SystemStatus::TestPass
        } else {
            SystemStatus::TestFail
        };
        self.set_system_status(status);
    }

    /// State-dependent operator clear action.
    pub fn clear_error(&mut self) {
        let next = match self.status {
            SystemStatus::SystemError => SystemStatus::TestErrorCleared,
            SystemStatus::EmergencyStop => SystemStatus::EmergencyCleared,
            SystemStatus::SafetyViolation => SystemStatus::SafetyCleared,
            SystemStatus::TestFail => SystemStatus::SystemIdle,
            other => {
                info!(status = %other, "clear request ignored in current state");
                return;
            }
        };
        self.set_system_status(next);
    }

    /// Best-effort shutdown: lamps off, outputs zeroed, link released.
    /// Never raises.
    pub async fn shutdown_system(&mut self) {
        info!("safety system shutting down");
        self.lamp.all_off();
        self.lamp.stop();
        if let Err(err) = self.dio.reset_all_outputs() {
            warn!(error = %err, "output reset failed during shutdown");
        }
        if let Err(err) = self.dio.disconnect().await {
            warn!(error = %err, "digital I/O disconnect failed during shutdown");
        }
    }

    /// Fan an alert out to log, GUI popup, and the tower lamp.
    fn trigger_alert(&mut self, alert: &SafetyAlert) {
        error!(
            level = %alert.level,
            sensors = ?alert.affected_sensors,
            "{}: {}",
            alert.title,
            alert.message
        );
        if let Some(callback) = &self.alert_callback {
            if let Err(reason) = callback(&alert.title, &alert.message, alert.level) {
                warn!(reason, "alert popup callback failed");
            }
        }
        let status = match alert.level {
            AlertLevel::Emergency => SystemStatus::EmergencyStop,
            AlertLevel::Critical => SystemStatus::SystemError,
            AlertLevel::Warning => SystemStatus::SafetyViolation,
        };
        self.set_system_status(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fts_common::config::{LampPins, SafetySensors};
    use fts_common::safety::{ContactType, EdgeType, SafetySensor};
    use fts_hal::SimDigitalIo;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn hardware() -> HardwareConfig {
        HardwareConfig {
            robot_axis_id: 1,
            brake_release_pin: 10,
            lamp: LampPins {
                red: 0,
                yellow: 1,
                green: 2,
                beeper: 3,
            },
            safety_sensors: SafetySensors {
                door: SafetySensor {
                    pin: 4,
                    contact: ContactType::B,
                    edge: EdgeType::Falling,
                },
                clamp: SafetySensor {
                    pin: 5,
                    contact: ContactType::A,
                    edge: EdgeType::Rising,
                },
                chain: SafetySensor {
                    pin: 6,
                    contact: ContactType::A,
                    edge: EdgeType::Rising,
                },
            },
        }
    }

    const FAST: LampTiming = LampTiming {
        blink_period: Duration::from_millis(100),
        beep_pulse: Duration::from_millis(40),
    };

    fn safe_inputs() -> HashMap<u8, bool> {
        HashMap::from([(4, false), (5, true), (6, true)])
    }

    fn door_open_inputs() -> HashMap<u8, bool> {
        HashMap::from([(4, true), (5, true), (6, true)])
    }

    async fn system(dio: &Arc<SimDigitalIo>) -> SafetySystem<SimDigitalIo> {
        SafetySystem::builder(Arc::clone(dio), hardware())
            .lamp_timing(FAST)
            .build()
            .await
            .expect("safety system build")
    }

    #[tokio::test]
    async fn build_connects_digital_io() {
        let dio = Arc::new(SimDigitalIo::new());
        assert!(!dio.is_connected());
        let system = system(&dio).await;
        assert!(dio.is_connected());
        assert_eq!(system.status(), SystemStatus::SystemIdle);
    }

    #[tokio::test]
    async fn safe_sensors_allow_test_start() {
        let dio = Arc::new(SimDigitalIo::new());
        let mut system = system(&dio).await;
        system.initialize_system();

        assert!(system.handle_test_start_request(&safe_inputs()));
        assert_eq!(system.status(), SystemStatus::SystemRunning);
    }

    #[tokio::test]
    async fn door_violation_refuses_start_and_triggers_once() {
        let dio = Arc::new(SimDigitalIo::new());
        let alerts = Arc::new(AtomicUsize::new(0));
        let alerts_probe = Arc::clone(&alerts);
        let mut system = SafetySystem::builder(Arc::clone(&dio), hardware())
            .lamp_timing(FAST)
            .alert_callback(move |_, _, _| {
                alerts_probe.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .await
            .unwrap();

        assert!(!system.handle_test_start_request(&door_open_inputs()));
        // Door-open is CRITICAL — maps to the error pattern.
        assert_eq!(system.status(), SystemStatus::SystemError);
        assert_eq!(alerts.load(Ordering::SeqCst), 1);

        // Same violation again: no re-trigger.
        assert!(!system.check_safety_conditions(&door_open_inputs()));
        assert_eq!(alerts.load(Ordering::SeqCst), 1);

        // Different violation type: re-trigger.
        let mut multi = door_open_inputs();
        multi.insert(5, false);
        assert!(!system.check_safety_conditions(&multi));
        assert_eq!(alerts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn warning_violation_resolution_reverts_to_idle() {
        let dio = Arc::new(SimDigitalIo::new());
        let mut system = system(&dio).await;

        // Clamp + chain down → MultipleSensors → Warning → SAFETY_VIOLATION.
        let inputs = HashMap::from([(4, false), (5, false), (6, false)]);
        assert!(!system.check_safety_conditions(&inputs));
        assert_eq!(system.status(), SystemStatus::SafetyViolation);

        // Resolution while in SAFETY_VIOLATION reverts to idle.
        assert!(system.check_safety_conditions(&safe_inputs()));
        assert_eq!(system.status(), SystemStatus::SystemIdle);
    }

    #[tokio::test]
    async fn critical_violation_resolution_keeps_error_status() {
        let dio = Arc::new(SimDigitalIo::new());
        let mut system = system(&dio).await;

        assert!(!system.check_safety_conditions(&door_open_inputs()));
        assert_eq!(system.status(), SystemStatus::SystemError);

        // Resolved, but status was not SAFETY_VIOLATION — no auto-revert.
        assert!(system.check_safety_conditions(&safe_inputs()));
        assert_eq!(system.status(), SystemStatus::SystemError);
    }

    #[tokio::test]
    async fn test_completion_routing() {
        let dio = Arc::new(SimDigitalIo::new());
        let mut system = system(&dio).await;

        system.handle_test_completion(true, None);
        assert_eq!(system.status(), SystemStatus::TestPass);

        system.handle_test_completion(false, None);
        assert_eq!(system.status(), SystemStatus::TestFail);

        let err = StationError::link(LinkName::Mcu, "dropped mid-run");
        system.handle_test_completion(false, Some(&err));
        assert_eq!(system.status(), SystemStatus::SystemError);
    }

    #[tokio::test]
    async fn clear_error_is_state_dependent() {
        let dio = Arc::new(SimDigitalIo::new());
        let mut system = system(&dio).await;

        system.set_system_status(SystemStatus::SafetyViolation);
        system.clear_error();
        assert_eq!(system.status(), SystemStatus::SafetyCleared);

        system.handle_emergency_stop();
        assert_eq!(system.status(), SystemStatus::EmergencyStop);
        system.clear_error();
        assert_eq!(system.status(), SystemStatus::EmergencyCleared);

        system.set_system_status(SystemStatus::TestFail);
        system.clear_error();
        assert_eq!(system.status(), SystemStatus::SystemIdle);

        // No-op from idle.
        system.clear_error();
        assert_eq!(system.status(), SystemStatus::SystemIdle);
    }

    #[tokio::test]
    async fn bad_observer_does_not_block_the_others() {
        let dio = Arc::new(SimDigitalIo::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_probe = Arc::clone(&seen);
        let mut system = SafetySystem::builder(Arc::clone(&dio), hardware())
            .lamp_timing(FAST)
            .observer(|_| Err("observer exploded".to_string()))
            .observer(move |_| {
                seen_probe.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .await
            .unwrap();

        system.set_system_status(SystemStatus::SystemRunning);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_zeroes_outputs_and_disconnects() {
        let dio = Arc::new(SimDigitalIo::new());
        let mut system = system(&dio).await;
        system.set_system_status(SystemStatus::SystemError);
        std::thread::sleep(Duration::from_millis(30));

        system.shutdown_system().await;
        assert!(!dio.is_connected());
        // Lamp channels were all driven low before the reset.
        for pin in [0u8, 1, 2, 3] {
            assert_ne!(dio.output(pin), Some(true), "pin {pin} left high");
        }
    }
}
