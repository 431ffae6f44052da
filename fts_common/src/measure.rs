//! Measurement data model.
//!
//! The matrix walk builds two views of the same readings:
//! - [`TestMeasurements`] - the run aggregate, accumulating force series
//!   across repeats and collapsed to per-cell means by [`TestMeasurements::finalize`].
//! - [`CycleMeasurements`] / [`CycleTiming`] - the per-repeat snapshot handed
//!   to the repository sink and summarized in a [`CycleResult`].

use serde::Serialize;
use std::time::{Duration, SystemTime};

/// Device-under-test identification for a run.
#[derive(Debug, Clone, Serialize)]
pub struct DutInfo {
    pub serial_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl DutInfo {
    pub fn new(serial_number: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            model: None,
        }
    }
}

// ─── Run Aggregate ──────────────────────────────────────────────────

/// Force series at one stroke position.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSeries {
    pub position: f64,
    /// One reading per repeat until finalization collapses them.
    pub forces: Vec<f64>,
}

/// All readings and timings at one matrix temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureBlock {
    pub temperature: f64,
    /// Heating duration per repeat (setpoint command + settle).
    pub heating: Vec<Duration>,
    /// Cooling duration per repeat.
    pub cooling: Vec<Duration>,
    pub positions: Vec<PositionSeries>,
}

/// Run-level measurement aggregate, built incrementally during the
/// matrix walk. Blocks follow the configured temperature list order;
/// positions follow the configured stroke list order.
#[derive(Debug, Clone, PartialEq)]
pub struct TestMeasurements {
    blocks: Vec<TemperatureBlock>,
    finalized: bool,
}

impl TestMeasurements {
    /// Pre-shape the aggregate for a temperature × position matrix.
    pub fn for_matrix(temperatures: &[f64], positions: &[f64]) -> Self {
        let blocks = temperatures
            .iter()
            .map(|&temperature| TemperatureBlock {
                temperature,
                heating: Vec::new(),
                cooling: Vec::new(),
                positions: positions
                    .iter()
                    .map(|&position| PositionSeries {
                        position,
                        forces: Vec::new(),
                    })
                    .collect(),
            })
            .collect();
        Self {
            blocks,
            finalized: false,
        }
    }

    pub fn blocks(&self) -> &[TemperatureBlock] {
        &self.blocks
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Record one force reading at (temperature index, position index).
    pub fn record_force(&mut self, temp_idx: usize, pos_idx: usize, force: f64) {
        if let Some(series) = self
            .blocks
            .get_mut(temp_idx)
            .and_then(|b| b.positions.get_mut(pos_idx))
        {
            series.forces.push(force);
        }
    }

    pub fn record_heating(&mut self, temp_idx: usize, duration: Duration) {
        if let Some(block) = self.blocks.get_mut(temp_idx) {
            block.heating.push(duration);
        }
    }

    pub fn record_cooling(&mut self, temp_idx: usize, duration: Duration) {
        if let Some(block) = self.blocks.get_mut(temp_idx) {
            block.cooling.push(duration);
        }
    }

    /// Total raw readings currently recorded.
    pub fn raw_reading_count(&self) -> usize {
        self.blocks
            .iter()
            .flat_map(|b| &b.positions)
            .map(|s| s.forces.len())
            .sum()
    }

    /// Force at a matrix cell; after finalization this is the mean.
    pub fn force(&self, temp_idx: usize, pos_idx: usize) -> Option<f64> {
        self.blocks
            .get(temp_idx)
            .and_then(|b| b.positions.get(pos_idx))
            .and_then(|s| match s.forces.as_slice() {
                [] => None,
                [single] => Some(*single),
                many => Some(mean(many)),
            })
    }

    /// Collapse every (temperature, position) force series to its
    /// arithmetic mean. Single-element series are left as-is.
    pub fn finalize(mut self) -> Self {
        for block in &mut self.blocks {
            for series in &mut block.positions {
                if series.forces.len() > 1 {
                    let avg = mean(&series.forces);
                    series.forces = vec![avg];
                }
            }
        }
        self.finalized = true;
        self
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

// ─── Per-Cycle Snapshot ─────────────────────────────────────────────

/// One reading of the per-repeat snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleReading {
    pub temperature: f64,
    pub position: f64,
    pub force: f64,
}

/// Force readings of a single matrix repeat.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleMeasurements {
    pub readings: Vec<CycleReading>,
}

impl CycleMeasurements {
    /// Mean force across this cycle's readings at the given temperature.
    pub fn mean_force_at(&self, temperature: f64) -> Option<f64> {
        let forces: Vec<f64> = self
            .readings
            .iter()
            .filter(|r| r.temperature == temperature)
            .map(|r| r.force)
            .collect();
        if forces.is_empty() {
            None
        } else {
            Some(mean(&forces))
        }
    }
}

/// Heating/cooling wall-clock for one temperature of one repeat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemperatureTiming {
    pub temperature: f64,
    pub heating_s: f64,
    pub cooling_s: f64,
}

impl TemperatureTiming {
    pub fn new(temperature: f64, heating: Duration, cooling: Duration) -> Self {
        Self {
            temperature,
            heating_s: heating.as_secs_f64(),
            cooling_s: cooling.as_secs_f64(),
        }
    }
}

/// Timing data of a single matrix repeat.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleTiming {
    pub temperatures: Vec<TemperatureTiming>,
}

/// Summary of one matrix repeat, immutable once created.
#[derive(Debug, Clone)]
pub struct CycleResult {
    pub cycle_number: u32,
    pub passed: bool,
    pub measurements: CycleMeasurements,
    pub timing: CycleTiming,
    pub execution_duration: Duration,
    pub completed_at: SystemTime,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_aggregate() -> TestMeasurements {
        // 2 temperatures × 2 positions × 3 repeats.
        let mut agg = TestMeasurements::for_matrix(&[40.0, 50.0], &[10.0, 100.0]);
        for repeat in 0..3 {
            for ti in 0..2 {
                for pi in 0..2 {
                    agg.record_force(ti, pi, 10.0 * (repeat + 1) as f64);
                }
                agg.record_heating(ti, Duration::from_secs(2));
                agg.record_cooling(ti, Duration::from_secs(1));
            }
        }
        agg
    }

    #[test]
    fn aggregate_counts_raw_readings() {
        let agg = filled_aggregate();
        assert_eq!(agg.raw_reading_count(), 12);
    }

    #[test]
    fn finalize_collapses_to_means() {
        let agg = filled_aggregate().finalize();
        assert!(agg.is_finalized());
        assert_eq!(agg.raw_reading_count(), 4);
        // mean of 10, 20, 30
        assert_eq!(agg.force(0, 0), Some(20.0));
        assert_eq!(agg.force(1, 1), Some(20.0));
        // timings keep one entry per repeat
        assert_eq!(agg.blocks()[0].heating.len(), 3);
    }

    #[test]
    fn finalize_leaves_single_repeat_untouched() {
        let mut agg = TestMeasurements::for_matrix(&[40.0], &[10.0]);
        agg.record_force(0, 0, 12.5);
        let agg = agg.finalize();
        assert_eq!(agg.force(0, 0), Some(12.5));
        assert_eq!(agg.raw_reading_count(), 1);
    }

    #[test]
    fn out_of_range_indices_are_ignored() {
        let mut agg = TestMeasurements::for_matrix(&[40.0], &[10.0]);
        agg.record_force(5, 0, 1.0);
        agg.record_force(0, 5, 1.0);
        assert_eq!(agg.raw_reading_count(), 0);
    }

    #[test]
    fn cycle_mean_force_per_temperature() {
        let cycle = CycleMeasurements {
            readings: vec![
                CycleReading {
                    temperature: 40.0,
                    position: 10.0,
                    force: 10.0,
                },
                CycleReading {
                    temperature: 40.0,
                    position: 100.0,
                    force: 20.0,
                },
                CycleReading {
                    temperature: 50.0,
                    position: 10.0,
                    force: 30.0,
                },
            ],
        };
        assert_eq!(cycle.mean_force_at(40.0), Some(15.0));
        assert_eq!(cycle.mean_force_at(50.0), Some(30.0));
        assert_eq!(cycle.mean_force_at(60.0), None);
    }
}
