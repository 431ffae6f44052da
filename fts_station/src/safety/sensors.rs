//! Safety sensor violation classifier.
//!
//! Works on raw digital-input snapshots; NC/NO mapping happens here so
//! callers always reason in logical "safe condition satisfied" terms.
//! De-duplication of repeated violations is owned by the system manager,
//! not the classifier.

use fts_common::config::SafetySensors;
use fts_common::safety::{SafetyAlert, SafetySensor, SensorKind, ViolationType};
use std::collections::HashMap;

/// The three monitored sensors of one station.
#[derive(Debug, Clone, Copy)]
pub struct SafetySensorSet {
    door: SafetySensor,
    clamp: SafetySensor,
    chain: SafetySensor,
}

impl SafetySensorSet {
    pub fn new(sensors: &SafetySensors) -> Self {
        Self {
            door: sensors.door,
            clamp: sensors.clamp,
            chain: sensors.chain,
        }
    }

    /// Classify the current snapshot (channel → raw level).
    ///
    /// Absent channels read as inactive. Returns `None` when every
    /// sensor's logical state is satisfied, the specific violation when
    /// exactly one fails, and `MultipleSensors` listing all failed
    /// sensors otherwise.
    pub fn check(&self, inputs: &HashMap<u8, bool>) -> Option<SafetyAlert> {
        let mut failed = Vec::new();
        for (kind, sensor) in [
            (SensorKind::Door, self.door),
            (SensorKind::Clamp, self.clamp),
            (SensorKind::Chain, self.chain),
        ] {
            let raw = inputs.get(&sensor.pin).copied().unwrap_or(false);
            if !sensor.contact.logical(raw) {
                failed.push(kind);
            }
        }

        match failed.as_slice() {
            [] => None,
            [single] => Some(SafetyAlert::for_violation(single.violation(), failed.clone())),
            _ => Some(SafetyAlert::for_violation(
                ViolationType::MultipleSensors,
                failed,
            )),
        }
    }
}
