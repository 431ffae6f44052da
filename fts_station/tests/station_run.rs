//! Full-station integration tests.
//!
//! Drives a complete simulated run through the facade and the safety
//! subsystem together: connect → initialize → setup/standby → gated
//! matrix → teardown → shutdown. Timers run under paused tokio time so
//! the multi-second stabilization discipline executes instantly.

use fts_common::config::{
    HardwareConfig, LampPins, SafetySensors, StabilizationDelays, TestConfiguration,
};
use fts_common::links::DigitalIoLink;
use fts_common::measure::DutInfo;
use fts_common::safety::{ContactType, EdgeType, SafetySensor};
use fts_common::status::{RobotState, SystemStatus};
use fts_hal::{SimDigitalIo, SimLoadCell, SimMcu, SimPowerSupply, SimRobot};
use fts_station::safety::{LampTiming, SafetySystem};
use fts_station::sequencer::TestStation;
use std::sync::Arc;
use std::time::Duration;

// ─── Fixtures ───────────────────────────────────────────────────────

fn test_config() -> TestConfiguration {
    TestConfiguration {
        voltage: 12.0,
        current: 1.5,
        max_voltage: 16.0,
        max_current: 3.0,
        temperatures: vec![40.0, 50.0],
        upper_temperature: 80.0,
        max_temperature: 95.0,
        standby_temperature: 35.0,
        activation_temperature: 45.0,
        stroke_positions: vec![10.0, 100.0],
        initial_position: 0.0,
        operating_position: 50.0,
        stabilization: StabilizationDelays::default(),
        temperature_tolerance: 1.0,
        repeat_count: 3,
        boot_timeout: 30.0,
        fan_speed_percent: 60.0,
    }
}

fn hardware_config() -> HardwareConfig {
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

const FAST_LAMP: LampTiming = LampTiming {
    blink_period: Duration::from_millis(100),
    beep_pulse: Duration::from_millis(40),
};

struct Station {
    robot: SimRobot,
    mcu: SimMcu,
    power: SimPowerSupply,
    load_cell: SimLoadCell,
    dio: Arc<SimDigitalIo>,
    facade: TestStation<SimRobot, SimMcu, SimPowerSupply, SimLoadCell, SimDigitalIo>,
}

fn station() -> Station {
    let robot = SimRobot::new();
    let mcu = SimMcu::new();
    let power = SimPowerSupply::new();
    let load_cell = SimLoadCell::new();
    let dio = Arc::new(SimDigitalIo::new());
    let facade = TestStation::new(
        robot.clone(),
        mcu.clone(),
        power.clone(),
        load_cell.clone(),
        Arc::clone(&dio),
    );
    Station {
        robot,
        mcu,
        power,
        load_cell,
        dio,
        facade,
    }
}

/// Preset every safety sensor to its logically-safe raw level.
fn preset_safe_sensors(dio: &SimDigitalIo, hardware: &HardwareConfig) {
    dio.set_input(hardware.safety_sensors.door.pin, false); // NC: low = closed
    dio.set_input(hardware.safety_sensors.clamp.pin, true);
    dio.set_input(hardware.safety_sensors.chain.pin, true);
}

async fn safety_system(
    dio: &Arc<SimDigitalIo>,
    hardware: &HardwareConfig,
) -> SafetySystem<SimDigitalIo> {
    SafetySystem::builder(Arc::clone(dio), hardware.clone())
        .lamp_timing(FAST_LAMP)
        .build()
        .await
        .expect("safety system build")
}

// ─── Full Run ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn full_simulated_run_passes_end_to_end() {
    let mut s = station();
    let config = test_config();
    let hardware = hardware_config();
    preset_safe_sensors(&s.dio, &hardware);

    let mut safety = safety_system(&s.dio, &hardware).await;
    safety.initialize_system();
    assert_eq!(safety.status(), SystemStatus::SystemIdle);

    s.facade.connect_all().await.unwrap();
    assert!(s.facade.status().all_connected());

    s.facade.initialize(&config, &hardware).await.unwrap();
    s.facade.setup_test(&config, &hardware).await.unwrap();

    s.load_cell.push_forces((1..=12).map(f64::from));
    let result = s
        .facade
        .run_test(&mut safety, &config, &hardware, &DutInfo::new("SN-IT-1"))
        .await
        .unwrap();

    let (aggregate, cycles) = result.expect("run should be cleared to start");
    assert_eq!(cycles.len(), 3);
    assert_eq!(aggregate.raw_reading_count(), 4);
    assert_eq!(aggregate.force(0, 0), Some(5.0));
    assert_eq!(safety.status(), SystemStatus::TestPass);

    s.facade.teardown(&config, &hardware).await.unwrap();
    assert!(!s.power.is_output_enabled());
    assert_eq!(s.facade.robot_state(), RobotState::InitialPosition);

    s.facade.shutdown().await.unwrap();
    assert!(!s.facade.status().all_connected());

    safety.shutdown_system().await;
    assert!(!s.dio.is_connected());
}

#[tokio::test(start_paused = true)]
async fn open_door_refuses_the_run_and_leaves_links_untouched() {
    let mut s = station();
    let config = test_config();
    let hardware = hardware_config();
    preset_safe_sensors(&s.dio, &hardware);
    // NC door sensor reads high: door open.
    s.dio.set_input(hardware.safety_sensors.door.pin, true);

    let mut safety = safety_system(&s.dio, &hardware).await;
    safety.initialize_system();

    s.facade.connect_all().await.unwrap();
    s.facade.initialize(&config, &hardware).await.unwrap();
    s.facade.setup_test(&config, &hardware).await.unwrap();

    let result = s
        .facade
        .run_test(&mut safety, &config, &hardware, &DutInfo::new("SN-IT-2"))
        .await
        .unwrap();
    assert!(result.is_none(), "safety must refuse the start");
    // Door-open is a critical violation — the error pattern is latched.
    assert_eq!(safety.status(), SystemStatus::SystemError);
    // No matrix traffic happened.
    assert_eq!(s.load_cell.reads(), 0);

    // Operator clears, door closes, next start succeeds.
    safety.clear_error();
    assert_eq!(safety.status(), SystemStatus::TestErrorCleared);
    s.dio.set_input(hardware.safety_sensors.door.pin, false);
    let result = s
        .facade
        .run_test(&mut safety, &config, &hardware, &DutInfo::new("SN-IT-2"))
        .await
        .unwrap();
    assert!(result.is_some());
    assert_eq!(safety.status(), SystemStatus::TestPass);
}

#[tokio::test(start_paused = true)]
async fn mid_run_link_failure_reports_system_error() {
    let mut s = station();
    let config = test_config();
    let hardware = hardware_config();
    preset_safe_sensors(&s.dio, &hardware);

    let mut safety = safety_system(&s.dio, &hardware).await;
    safety.initialize_system();

    s.facade.connect_all().await.unwrap();
    s.facade.initialize(&config, &hardware).await.unwrap();
    s.facade.setup_test(&config, &hardware).await.unwrap();

    // Out-of-tolerance DUT: every verification read is far off target.
    s.mcu.script_temperatures(std::iter::repeat_n(150.0, 64));
    let err = s
        .facade
        .run_test(&mut safety, &config, &hardware, &DutInfo::new("SN-IT-3"))
        .await
        .expect_err("verification must exhaust");
    assert!(!err.is_cancelled());
    assert_eq!(safety.status(), SystemStatus::SystemError);

    // Cleanup still completes.
    s.facade.teardown(&config, &hardware).await.unwrap();
    assert!(!s.power.is_output_enabled());
}

#[tokio::test(start_paused = true)]
async fn standby_sequence_exercises_the_robot_cycle() {
    let mut s = station();
    let config = test_config();
    let hardware = hardware_config();

    s.facade.connect_all().await.unwrap();
    s.facade.initialize(&config, &hardware).await.unwrap();
    let moves_after_init = s.robot.move_calls();

    s.facade.standby_sequence(&config, &hardware).await.unwrap();
    // Out to the operating position and back.
    assert_eq!(s.robot.move_calls(), moves_after_init + 2);
    assert_eq!(s.facade.robot_state(), RobotState::InitialPosition);
    assert_eq!(s.mcu.upper_temperature(), config.upper_temperature);
    assert_eq!(s.mcu.fan_speed(), config.fan_speed_percent);
}
