//! # FTS Station Binary
//!
//! Wires the simulation hardware backends to the orchestration facade
//! and the industrial safety subsystem, then drives one full run:
//! connect → initialize → setup (standby) → gated test matrix →
//! teardown → shutdown. Ctrl+C cancels the run cooperatively; teardown
//! and shutdown still execute.

use clap::Parser;
use fts_common::config::{ConfigLoader, StationConfig, TestConfiguration, TestOverrides};
use fts_common::error::StationError;
use fts_common::links::DigitalIoLink;
use fts_common::measure::DutInfo;
use fts_hal::{SimDigitalIo, SimLoadCell, SimMcu, SimPowerSupply, SimRobot};
use fts_station::safety::SafetySystem;
use fts_station::sequencer::TestStation;
use fts_station::sinks::{ConsoleProgress, JsonlMeasurementRepository};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

type SimStation = TestStation<SimRobot, SimMcu, SimPowerSupply, SimLoadCell, SimDigitalIo>;

#[derive(Parser, Debug)]
#[command(name = "fts_station", about = "EOL force test station")]
struct Cli {
    /// Station configuration TOML ([test] + [hardware] tables).
    #[arg(long, default_value = "station.toml")]
    config: PathBuf,

    /// DUT serial number.
    #[arg(long, default_value = "DEV-0001")]
    serial: String,

    /// Override the configured repeat count.
    #[arg(long)]
    repeat: Option<u32>,

    /// Simulation bench: bypass temperature verification.
    #[arg(long)]
    simulated: bool,

    /// Append per-cycle measurements to this JSONL file.
    #[arg(long)]
    measurements: Option<PathBuf>,
}

async fn run_sequence(
    station: &mut SimStation,
    safety: &mut SafetySystem<SimDigitalIo>,
    test: &TestConfiguration,
    config: &StationConfig,
    dut: &DutInfo,
) -> Result<(), StationError> {
    station.connect_all().await?;
    station.initialize(test, &config.hardware).await?;
    station.setup_test(test, &config.hardware).await?;

    match station.run_test(safety, test, &config.hardware, dut).await? {
        Some((aggregate, cycles)) => {
            info!(
                cycles = cycles.len(),
                cells = aggregate.raw_reading_count(),
                "✅ test run complete"
            );
            Ok(())
        }
        None => {
            warn!("safety clearance refused; test not started");
            Ok(())
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    let cli = Cli::parse();
    info!("🚀 Starting force test station");

    let config = StationConfig::load(&cli.config)?;
    let test = match cli.repeat {
        Some(repeat) => config.test.with_overrides(TestOverrides {
            repeat_count: Some(repeat),
            ..Default::default()
        })?,
        None => config.test.clone(),
    };

    // Simulation bench wiring: sensors preset to their safe levels
    // (the door sensor is NC — raw low already reads safe).
    let dio = Arc::new(SimDigitalIo::new());
    dio.connect().await.map_err(|e| e.to_string())?;
    dio.set_input(config.hardware.safety_sensors.clamp.pin, true);
    dio.set_input(config.hardware.safety_sensors.chain.pin, true);

    let mut safety = SafetySystem::builder(Arc::clone(&dio), config.hardware.clone())
        .observer(|status| {
            info!(%status, "system status");
            Ok(())
        })
        .build()
        .await?;
    safety.initialize_system();

    let mut station = TestStation::new(
        SimRobot::new(),
        SimMcu::new(),
        SimPowerSupply::new(),
        SimLoadCell::new(),
        Arc::clone(&dio),
    )
    .with_simulated_environment(cli.simulated)
    .with_progress_sink(Box::new(ConsoleProgress));
    if let Some(path) = &cli.measurements {
        station = station.with_repository(Box::new(JsonlMeasurementRepository::new(path)));
    }

    let dut = DutInfo::new(cli.serial.clone());

    let outcome = tokio::select! {
        result = run_sequence(&mut station, &mut safety, &test, &config, &dut) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("🛑 interrupt received; aborting run");
            Err(StationError::Cancelled)
        }
    };

    if let Err(err) = &outcome {
        if err.is_cancelled() {
            info!("run cancelled; executing cleanup");
        } else {
            error!(error = %err, "run failed; executing cleanup");
        }
    }

    // Cleanup always executes, cancelled or not.
    if let Err(err) = station.teardown(&test, &config.hardware).await {
        warn!(error = %err, "teardown incomplete");
    }
    if let Err(err) = station.shutdown().await {
        warn!(error = %err, "hardware shutdown incomplete");
    }
    safety.shutdown_system().await;
    info!("🏁 Station shutdown complete");

    match outcome {
        Ok(()) => Ok(()),
        Err(err) => Err(Box::new(err) as Box<dyn std::error::Error>),
    }
}
