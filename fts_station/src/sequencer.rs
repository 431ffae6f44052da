//! Hardware orchestration facade.
//!
//! `TestStation` owns the robot/MCU/power/load-cell links exclusively and
//! shares one digital-I/O handle with the safety subsystem. It runs on a
//! single-threaded cooperative scheduler: every hardware call and every
//! stabilization sleep is a suspension point, and operations execute
//! strictly in program order. The only concurrent fan-outs are
//! [`TestStation::connect_all`] and [`TestStation::shutdown`], which join
//! the per-link connect/disconnect calls.
//!
//! Error policy: failures inside initialize/setup/standby/matrix are
//! wrapped with sequence context and abort the run; failures inside
//! teardown/shutdown are logged and swallowed — except the cooperative
//! cancellation signal, which always propagates.

use fts_common::config::{HardwareConfig, INTER_CYCLE_DELAY_S, TestConfiguration};
use fts_common::error::{ErrorContext, StationError};
use fts_common::links::{
    DigitalIoLink, LinkError, LinkName, LoadCellLink, McuLink, PowerLink, RobotLink,
};
use fts_common::measure::{
    CycleMeasurements, CycleReading, CycleResult, CycleTiming, DutInfo, TemperatureTiming,
    TestMeasurements,
};
use fts_common::status::RobotState;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::safety::SafetySystem;
use crate::sinks::{CycleProgress, MeasurementRepository, OperatorPrompt, ProgressSink};

/// Temperature verification: 1 initial attempt + 10 retries.
pub const TEMP_VERIFY_MAX_ATTEMPTS: u32 = 11;
/// Fixed spacing between verification attempts.
const TEMP_VERIFY_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Fixed short delay taken by the simulated-environment bypass.
const SIMULATED_VERIFY_DELAY: Duration = Duration::from_millis(100);

/// Snapshot of link connection states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatusReport {
    pub robot: bool,
    pub mcu: bool,
    pub power: bool,
    pub load_cell: bool,
    pub digital_io: bool,
}

impl LinkStatusReport {
    pub fn all_connected(&self) -> bool {
        self.robot && self.mcu && self.power && self.load_cell && self.digital_io
    }

    pub fn as_map(&self) -> HashMap<LinkName, bool> {
        HashMap::from([
            (LinkName::Robot, self.robot),
            (LinkName::Mcu, self.mcu),
            (LinkName::Power, self.power),
            (LinkName::LoadCell, self.load_cell),
            (LinkName::DigitalIo, self.digital_io),
        ])
    }
}

/// Map a link-level failure to the station taxonomy, preserving the
/// cancellation signal.
fn link_failure(link: LinkName, stage: &str, err: LinkError) -> StationError {
    match err {
        LinkError::Cancelled => StationError::Cancelled,
        err => StationError::link(link, format!("{stage}: {err}")),
    }
}

/// Stabilization wait after a state-changing device command.
async fn settle(seconds: f64) {
    if seconds > 0.0 {
        tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
    }
}

/// Top-level hardware coordinator for one station.
pub struct TestStation<R, M, P, L, D> {
    robot: R,
    mcu: M,
    power: P,
    load_cell: L,
    dio: Arc<D>,
    robot_state: RobotState,
    /// Homing is scoped to the process lifetime; reset only via
    /// [`TestStation::reset_homing`].
    robot_homed: bool,
    /// Simulation bench: temperature verification short-circuits.
    simulated: bool,
    repository: Option<Box<dyn MeasurementRepository>>,
    progress: Option<Box<dyn ProgressSink>>,
    prompt: Option<Box<dyn OperatorPrompt>>,
}

impl<R, M, P, L, D> TestStation<R, M, P, L, D>
where
    R: RobotLink,
    M: McuLink,
    P: PowerLink,
    L: LoadCellLink,
    D: DigitalIoLink + Send + Sync + 'static,
{
    pub fn new(robot: R, mcu: M, power: P, load_cell: L, dio: Arc<D>) -> Self {
        Self {
            robot,
            mcu,
            power,
            load_cell,
            dio,
            robot_state: RobotState::Unknown,
            robot_homed: false,
            simulated: false,
            repository: None,
            progress: None,
            prompt: None,
        }
    }

    /// Mark this station as a simulation bench (explicit, logged bypass
    /// of temperature verification).
    pub fn with_simulated_environment(mut self, simulated: bool) -> Self {
        self.simulated = simulated;
        self
    }

    pub fn with_repository(mut self, repository: Box<dyn MeasurementRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_progress_sink(mut self, progress: Box<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_operator_prompt(mut self, prompt: Box<dyn OperatorPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn robot_state(&self) -> RobotState {
        self.robot_state
    }

    pub fn is_robot_homed(&self) -> bool {
        self.robot_homed
    }

    /// External error handlers force a re-home on the next initialize.
    pub fn reset_homing(&mut self) {
        self.robot_homed = false;
    }

    /// Shared digital-I/O handle (also held by the safety subsystem).
    pub fn digital_io(&self) -> &Arc<D> {
        &self.dio
    }

    // ─── Connection Management ──────────────────────────────────────

    /// Connect every link that is not already connected, concurrently.
    ///
    /// On any failure the error lists exactly the links that failed;
    /// links that connected successfully are left connected.
    pub async fn connect_all(&mut self) -> Result<(), StationError> {
        info!("connecting hardware links");
        let robot = &mut self.robot;
        let mcu = &mut self.mcu;
        let power = &mut self.power;
        let load_cell = &mut self.load_cell;
        let dio = Arc::clone(&self.dio);

        let (robot_res, mcu_res, power_res, cell_res, dio_res) = tokio::join!(
            async {
                if robot.is_connected() {
                    Ok(())
                } else {
                    robot.connect().await
                }
            },
            async {
                if mcu.is_connected() {
                    Ok(())
                } else {
                    mcu.connect().await
                }
            },
            async {
                if power.is_connected() {
                    Ok(())
                } else {
                    power.connect().await
                }
            },
            async {
                if load_cell.is_connected() {
                    Ok(())
                } else {
                    load_cell.connect().await
                }
            },
            async {
                if dio.is_connected() {
                    Ok(())
                } else {
                    dio.connect().await
                }
            },
        );

        let mut failed = Vec::new();
        let mut cancelled = false;
        for (name, result) in [
            (LinkName::Robot, robot_res),
            (LinkName::Mcu, mcu_res),
            (LinkName::Power, power_res),
            (LinkName::LoadCell, cell_res),
            (LinkName::DigitalIo, dio_res),
        ] {
            if let Err(err) = result {
                if matches!(err, LinkError::Cancelled) {
                    cancelled = true;
                }
                warn!(link = %name, error = %err, "link connect failed");
                failed.push(name);
            }
        }

        if cancelled {
            return Err(StationError::Cancelled);
        }
        if !failed.is_empty() {
            return Err(StationError::links(
                failed,
                "one or more links failed to connect",
            ));
        }
        info!("all hardware links connected");
        Ok(())
    }

    /// Snapshot of link → connected.
    pub fn status(&self) -> LinkStatusReport {
        LinkStatusReport {
            robot: self.robot.is_connected(),
            mcu: self.mcu.is_connected(),
            power: self.power.is_connected(),
            load_cell: self.load_cell.is_connected(),
            digital_io: self.dio.is_connected(),
        }
    }

    /// Best-effort shutdown: power output off first, then concurrent
    /// disconnect of every connected link. Errors are swallowed;
    /// cancellation propagates.
    pub async fn shutdown(&mut self) -> Result<(), StationError> {
        info!("shutting down hardware links");
        if self.power.is_connected() {
            match self.power.disable_output().await {
                Err(LinkError::Cancelled) => return Err(StationError::Cancelled),
                Err(err) => warn!(error = %err, "power output disable failed during shutdown"),
                Ok(()) => {}
            }
        }

        let robot = &mut self.robot;
        let mcu = &mut self.mcu;
        let power = &mut self.power;
        let load_cell = &mut self.load_cell;
        let dio = Arc::clone(&self.dio);

        let (robot_res, mcu_res, power_res, cell_res, dio_res) = tokio::join!(
            async {
                if robot.is_connected() {
                    robot.disconnect().await
                } else {
                    Ok(())
                }
            },
            async {
                if mcu.is_connected() {
                    mcu.disconnect().await
                } else {
                    Ok(())
                }
            },
            async {
                if power.is_connected() {
                    power.disconnect().await
                } else {
                    Ok(())
                }
            },
            async {
                if load_cell.is_connected() {
                    load_cell.disconnect().await
                } else {
                    Ok(())
                }
            },
            async {
                if dio.is_connected() {
                    dio.disconnect().await
                } else {
                    Ok(())
                }
            },
        );

        let mut cancelled = false;
        for (name, result) in [
            (LinkName::Robot, robot_res),
            (LinkName::Mcu, mcu_res),
            (LinkName::Power, power_res),
            (LinkName::LoadCell, cell_res),
            (LinkName::DigitalIo, dio_res),
        ] {
            if let Err(err) = result {
                if matches!(err, LinkError::Cancelled) {
                    cancelled = true;
                }
                warn!(link = %name, error = %err, "link disconnect failed during shutdown");
            }
        }
        if cancelled {
            Err(StationError::Cancelled)
        } else {
            Ok(())
        }
    }

    // ─── Initialization ─────────────────────────────────────────────

    /// Strict ordered initialization sequence. Each network command is
    /// followed by its stabilization delay. Homing runs only once per
    /// process lifetime.
    pub async fn initialize(
        &mut self,
        config: &TestConfiguration,
        hardware: &HardwareConfig,
    ) -> Result<(), StationError> {
        let context = ErrorContext::new()
            .with("voltage", config.voltage)
            .with("current", config.current);
        self.initialize_inner(config, hardware)
            .await
            .map_err(|err| err.with_context(context))
    }

    async fn initialize_inner(
        &mut self,
        config: &TestConfiguration,
        hardware: &HardwareConfig,
    ) -> Result<(), StationError> {
        info!("initializing station hardware");
        let delay = config.stabilization.command;

        self.dio
            .write_output(hardware.brake_release_pin, true)
            .map_err(|e| link_failure(LinkName::DigitalIo, "brake release", e))?;
        settle(delay).await;

        self.power
            .disable_output()
            .await
            .map_err(|e| link_failure(LinkName::Power, "output disable", e))?;
        settle(delay).await;

        self.power
            .set_voltage(config.voltage)
            .await
            .map_err(|e| link_failure(LinkName::Power, "voltage setpoint", e))?;
        settle(delay).await;

        self.power
            .set_current(config.current)
            .await
            .map_err(|e| link_failure(LinkName::Power, "current setpoint", e))?;
        settle(delay).await;

        self.power
            .set_current_limit(config.max_current)
            .await
            .map_err(|e| link_failure(LinkName::Power, "current limit", e))?;
        settle(delay).await;

        self.robot
            .enable_servo(hardware.robot_axis_id)
            .await
            .map_err(|e| link_failure(LinkName::Robot, "servo enable", e))?;
        settle(delay).await;

        if self.robot_homed {
            debug!("robot already homed this process; skipping homing");
        } else {
            self.robot
                .home_axis(hardware.robot_axis_id)
                .await
                .map_err(|e| link_failure(LinkName::Robot, "homing", e))?;
            settle(delay).await;
            self.robot_homed = true;
            self.robot_state = RobotState::Home;
        }

        self.move_robot(hardware, config.initial_position, RobotState::InitialPosition)
            .await?;
        settle(config.stabilization.robot_move).await;

        info!("station hardware initialized");
        Ok(())
    }

    // ─── Test Setup & Standby ───────────────────────────────────────

    /// Power the DUT, wait for the MCU boot signal (wall-clock bounded),
    /// enter test mode, then run the standby sequence.
    pub async fn setup_test(
        &mut self,
        config: &TestConfiguration,
        hardware: &HardwareConfig,
    ) -> Result<(), StationError> {
        info!("setting up test");
        self.power
            .enable_output()
            .await
            .map_err(|e| link_failure(LinkName::Power, "output enable", e))?;
        settle(config.stabilization.power_on).await;

        // Presentation concern only — never gates the sequence.
        match &self.prompt {
            Some(prompt) => prompt.notify("Turn on the DUT power switch"),
            None => info!("turn on the DUT power switch"),
        }

        let bound = Duration::from_secs_f64(config.boot_timeout);
        match tokio::time::timeout(bound, self.mcu.wait_boot_complete()).await {
            Err(_) => {
                return Err(StationError::link(
                    LinkName::Mcu,
                    format!(
                        "boot-complete not signalled within {:.1}s",
                        config.boot_timeout
                    ),
                ));
            }
            Ok(Err(err)) => return Err(link_failure(LinkName::Mcu, "boot wait", err)),
            Ok(Ok(())) => {}
        }
        settle(config.stabilization.command).await;

        self.mcu
            .set_test_mode()
            .await
            .map_err(|e| link_failure(LinkName::Mcu, "test mode", e))?;
        settle(config.stabilization.mcu_mode).await;

        self.standby_sequence(config, hardware).await
    }

    /// Multi-stage heating/cooling standby procedure with a robot
    /// exercise cycle in between.
    pub async fn standby_sequence(
        &mut self,
        config: &TestConfiguration,
        hardware: &HardwareConfig,
    ) -> Result<(), StationError> {
        let context = ErrorContext::new()
            .with("operating_temp", config.activation_temperature)
            .with("standby_temp", config.standby_temperature);
        self.standby_inner(config, hardware)
            .await
            .map_err(|err| err.with_context(context))
    }

    async fn standby_inner(
        &mut self,
        config: &TestConfiguration,
        hardware: &HardwareConfig,
    ) -> Result<(), StationError> {
        info!("running standby sequence");
        let delay = config.stabilization.command;

        self.mcu
            .set_upper_temperature(config.upper_temperature)
            .await
            .map_err(|e| link_failure(LinkName::Mcu, "upper temperature", e))?;
        settle(delay).await;

        self.mcu
            .set_fan_speed(config.fan_speed_percent)
            .await
            .map_err(|e| link_failure(LinkName::Mcu, "fan speed", e))?;
        settle(delay).await;

        self.mcu
            .start_standby_heating(config.activation_temperature, config.standby_temperature)
            .await
            .map_err(|e| link_failure(LinkName::Mcu, "standby heating", e))?;
        self.verify_temperature(config.activation_temperature, config)
            .await?;

        self.move_robot(
            hardware,
            config.operating_position,
            RobotState::MeasurementPosition,
        )
        .await?;
        settle(config.stabilization.robot_move).await;
        settle(config.stabilization.robot_standby).await;

        self.move_robot(hardware, config.initial_position, RobotState::InitialPosition)
            .await?;
        settle(config.stabilization.robot_move).await;

        self.mcu
            .start_standby_cooling()
            .await
            .map_err(|e| link_failure(LinkName::Mcu, "standby cooling", e))?;
        settle(config.stabilization.cooling).await;
        self.verify_temperature(config.standby_temperature, config)
            .await?;

        info!("standby sequence complete");
        Ok(())
    }

    // ─── Temperature Verification ───────────────────────────────────

    /// Verify the DUT temperature against `expected` with retries:
    /// up to 11 read attempts, 1 s apart, succeeding immediately once
    /// `|actual - expected| <= tolerance`.
    ///
    /// On a simulation bench the check is bypassed — explicitly logged —
    /// after a fixed short delay.
    pub async fn verify_temperature(
        &mut self,
        expected: f64,
        config: &TestConfiguration,
    ) -> Result<(), StationError> {
        if self.simulated {
            info!(expected, "simulated environment: temperature verification bypassed");
            tokio::time::sleep(SIMULATED_VERIFY_DELAY).await;
            return Ok(());
        }

        let tolerance = config.temperature_tolerance;
        let mut attempt = 1;
        loop {
            let actual = self
                .mcu
                .get_temperature()
                .await
                .map_err(|e| link_failure(LinkName::Mcu, "temperature read", e))?;
            let diff = (actual - expected).abs();
            if diff <= tolerance {
                debug!(expected, actual, attempt, "temperature verified");
                return Ok(());
            }
            if attempt >= TEMP_VERIFY_MAX_ATTEMPTS {
                return Err(StationError::operation(
                    "temperature verification exhausted retries",
                    ErrorContext::new()
                        .with("actual", actual)
                        .with("expected", expected)
                        .with("diff", diff)
                        .with("tolerance", tolerance),
                ));
            }
            warn!(
                expected,
                actual, diff, attempt, "temperature out of tolerance; retrying"
            );
            attempt += 1;
            tokio::time::sleep(TEMP_VERIFY_RETRY_DELAY).await;
        }
    }

    // ─── Measurement Matrix ─────────────────────────────────────────

    /// Walk the temperature × position × repeat matrix.
    ///
    /// Per repeat: heat + verify each temperature in list order, read
    /// the peak force at each stroke position in list order, park the
    /// robot, cool + verify, then persist the cycle snapshot (failures
    /// logged, never fatal) and push per-temperature progress rows.
    /// After all repeats the aggregate collapses force series to their
    /// means.
    pub async fn run_force_test_matrix(
        &mut self,
        config: &TestConfiguration,
        hardware: &HardwareConfig,
        dut: &DutInfo,
    ) -> Result<(TestMeasurements, Vec<CycleResult>), StationError> {
        info!(
            serial = %dut.serial_number,
            repeats = config.repeat_count,
            temperatures = config.temperatures.len(),
            positions = config.stroke_positions.len(),
            "starting force test matrix"
        );
        let mut aggregate =
            TestMeasurements::for_matrix(&config.temperatures, &config.stroke_positions);
        let mut cycles = Vec::with_capacity(config.repeat_count as usize);
        let max_stroke = config.max_stroke();

        for cycle in 1..=config.repeat_count {
            let cycle_start = Instant::now();
            let mut readings = Vec::new();
            let mut timing = CycleTiming::default();

            for (temp_idx, &temperature) in config.temperatures.iter().enumerate() {
                let heat_start = Instant::now();
                self.mcu
                    .set_operating_temperature(temperature)
                    .await
                    .map_err(|e| link_failure(LinkName::Mcu, "operating temperature", e))?;
                settle(config.stabilization.command).await;
                let heating = heat_start.elapsed();
                self.verify_temperature(temperature, config).await?;

                for (pos_idx, &position) in config.stroke_positions.iter().enumerate() {
                    let arrived = if position == max_stroke {
                        RobotState::MaxStroke
                    } else {
                        RobotState::MeasurementPosition
                    };
                    self.move_robot(hardware, position, arrived).await?;
                    settle(config.stabilization.robot_move).await;

                    let force = self
                        .load_cell
                        .read_peak_force()
                        .await
                        .map_err(|e| link_failure(LinkName::LoadCell, "peak force read", e))?;
                    debug!(cycle, temperature, position, force, "force sample");
                    aggregate.record_force(temp_idx, pos_idx, force);
                    readings.push(CycleReading {
                        temperature,
                        position,
                        force,
                    });
                }

                if self.robot_state != RobotState::InitialPosition {
                    self.move_robot(
                        hardware,
                        config.initial_position,
                        RobotState::InitialPosition,
                    )
                    .await?;
                    settle(config.stabilization.robot_move).await;
                }

                let cool_start = Instant::now();
                self.mcu
                    .start_standby_cooling()
                    .await
                    .map_err(|e| link_failure(LinkName::Mcu, "standby cooling", e))?;
                settle(config.stabilization.cooling).await;
                let cooling = cool_start.elapsed();
                self.verify_temperature(config.standby_temperature, config)
                    .await?;

                aggregate.record_heating(temp_idx, heating);
                aggregate.record_cooling(temp_idx, cooling);
                timing
                    .temperatures
                    .push(TemperatureTiming::new(temperature, heating, cooling));
            }

            let measurements = CycleMeasurements { readings };
            if let Some(repository) = self.repository.as_mut() {
                if let Err(err) = repository.save_cycle(
                    &measurements,
                    cycle,
                    config.repeat_count,
                    &dut.serial_number,
                    &timing,
                ) {
                    warn!(cycle, error = %err, "cycle measurement save failed; run continues");
                }
            }

            if let Some(progress) = self.progress.as_mut() {
                // One row per temperature, carrying the per-temperature
                // mean force of this cycle.
                for entry in &timing.temperatures {
                    let Some(force) = measurements.mean_force_at(entry.temperature) else {
                        continue;
                    };
                    let update = CycleProgress {
                        cycle,
                        total_cycles: config.repeat_count,
                        temperature: entry.temperature,
                        stroke: max_stroke,
                        force,
                        heating: Duration::from_secs_f64(entry.heating_s),
                        cooling: Duration::from_secs_f64(entry.cooling_s),
                        passed: true,
                    };
                    if let Err(err) = progress.add_cycle_result(&update) {
                        warn!(cycle, error = %err, "progress update failed");
                    }
                }
            }

            cycles.push(CycleResult {
                cycle_number: cycle,
                passed: true,
                measurements,
                timing,
                execution_duration: cycle_start.elapsed(),
                completed_at: SystemTime::now(),
                notes: None,
            });
            info!(cycle, of = config.repeat_count, "cycle complete");

            if cycle < config.repeat_count {
                settle(INTER_CYCLE_DELAY_S).await;
            }
        }

        Ok((aggregate.finalize(), cycles))
    }

    // ─── Teardown ───────────────────────────────────────────────────

    /// Best-effort teardown: park the robot if needed, power output off.
    /// Errors are logged and swallowed; cancellation propagates.
    pub async fn teardown(
        &mut self,
        config: &TestConfiguration,
        hardware: &HardwareConfig,
    ) -> Result<(), StationError> {
        info!("tearing down test");
        if self.robot_state != RobotState::InitialPosition {
            match self
                .move_robot(hardware, config.initial_position, RobotState::InitialPosition)
                .await
            {
                Err(StationError::Cancelled) => return Err(StationError::Cancelled),
                Err(err) => warn!(error = %err, "robot park failed during teardown"),
                Ok(()) => settle(config.stabilization.robot_move).await,
            }
        }
        match self.power.disable_output().await {
            Err(LinkError::Cancelled) => return Err(StationError::Cancelled),
            Err(err) => warn!(error = %err, "power output disable failed during teardown"),
            Ok(()) => {}
        }
        Ok(())
    }

    // ─── Safety Integration ─────────────────────────────────────────

    /// Full gated run: ask the safety manager for clearance, walk the
    /// matrix, report the completion. Returns `None` when the safety
    /// system refused the start (the status is left to the safety
    /// layer's violation handling).
    pub async fn run_test(
        &mut self,
        safety: &mut SafetySystem<D>,
        config: &TestConfiguration,
        hardware: &HardwareConfig,
        dut: &DutInfo,
    ) -> Result<Option<(TestMeasurements, Vec<CycleResult>)>, StationError> {
        let inputs = self
            .dio
            .read_all_inputs()
            .map_err(|e| link_failure(LinkName::DigitalIo, "sensor snapshot", e))?;
        if !safety.handle_test_start_request(&inputs) {
            warn!("test start refused by safety system");
            return Ok(None);
        }

        match self.run_force_test_matrix(config, hardware, dut).await {
            Ok(result) => {
                safety.handle_test_completion(true, None);
                Ok(Some(result))
            }
            Err(err) => {
                if !err.is_cancelled() {
                    safety.handle_test_completion(false, Some(&err));
                }
                Err(err)
            }
        }
    }

    // ─── Internals ──────────────────────────────────────────────────

    async fn move_robot(
        &mut self,
        hardware: &HardwareConfig,
        position: f64,
        arrived: RobotState,
    ) -> Result<(), StationError> {
        self.robot_state = RobotState::Moving;
        match self
            .robot
            .move_absolute(hardware.robot_axis_id, position)
            .await
        {
            Ok(()) => {
                self.robot_state = arrived;
                Ok(())
            }
            Err(err) => {
                self.robot_state = RobotState::Unknown;
                Err(link_failure(LinkName::Robot, "move", err))
            }
        }
    }
}
