//! Optional collaborator sinks.
//!
//! All three are fire-and-forget from the facade's point of view: a sink
//! failure is logged and never aborts the run or blocks later cycles.

use fts_common::measure::{CycleMeasurements, CycleTiming};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Error type for sink operations.
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    /// Underlying I/O failure (file, socket, GUI bridge).
    #[error("sink I/O error: {0}")]
    Io(String),

    /// Sink refused the data.
    #[error("sink rejected data: {0}")]
    Rejected(String),
}

/// Persists one cycle's measurements per call.
pub trait MeasurementRepository: Send {
    fn save_cycle(
        &mut self,
        measurements: &CycleMeasurements,
        cycle: u32,
        total_cycles: u32,
        serial_number: &str,
        timing: &CycleTiming,
    ) -> Result<(), SinkError>;
}

/// One progress row: per-temperature summary of one cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleProgress {
    pub cycle: u32,
    pub total_cycles: u32,
    pub temperature: f64,
    /// Largest stroke position measured [mm].
    pub stroke: f64,
    /// Mean force across this cycle's readings at `temperature` [N].
    pub force: f64,
    pub heating: Duration,
    pub cooling: Duration,
    pub passed: bool,
}

/// Receives one progress row per temperature per cycle.
pub trait ProgressSink: Send {
    fn add_cycle_result(&mut self, progress: &CycleProgress) -> Result<(), SinkError>;
}

/// Interactive operator surface (e.g. a GUI confirmation banner).
pub trait OperatorPrompt: Send {
    fn notify(&self, message: &str);
}

// ─── Implementations ────────────────────────────────────────────────

#[derive(Serialize)]
struct CycleRecord<'a> {
    serial_number: &'a str,
    cycle: u32,
    total_cycles: u32,
    measurements: &'a CycleMeasurements,
    timing: &'a CycleTiming,
}

/// File-backed repository: appends one JSON line per cycle.
#[derive(Debug, Clone)]
pub struct JsonlMeasurementRepository {
    path: PathBuf,
}

impl JsonlMeasurementRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MeasurementRepository for JsonlMeasurementRepository {
    fn save_cycle(
        &mut self,
        measurements: &CycleMeasurements,
        cycle: u32,
        total_cycles: u32,
        serial_number: &str,
        timing: &CycleTiming,
    ) -> Result<(), SinkError> {
        let record = CycleRecord {
            serial_number,
            cycle,
            total_cycles,
            measurements,
            timing,
        };
        let line =
            serde_json::to_string(&record).map_err(|e| SinkError::Rejected(e.to_string()))?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SinkError::Io(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| SinkError::Io(e.to_string()))?;
        Ok(())
    }
}

/// Progress sink that logs one row per temperature per cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn add_cycle_result(&mut self, progress: &CycleProgress) -> Result<(), SinkError> {
        info!(
            cycle = progress.cycle,
            total = progress.total_cycles,
            temperature = progress.temperature,
            stroke = progress.stroke,
            force = format!("{:.2}", progress.force),
            heating_s = format!("{:.1}", progress.heating.as_secs_f64()),
            cooling_s = format!("{:.1}", progress.cooling.as_secs_f64()),
            passed = progress.passed,
            "cycle progress"
        );
        Ok(())
    }
}
