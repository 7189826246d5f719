//! Sensor readings, the per-sensor state projection and alarm evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default alarm threshold in the configured unit.
pub const DEFAULT_ALARM_THRESHOLD: f64 = 38.0;

/// Decides whether a value raises an alarm.
///
/// A value alarms when it is strictly greater than the threshold; a value
/// equal to the threshold does not.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlarmEvaluator {
    threshold: f64,
}

impl Default for AlarmEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_ALARM_THRESHOLD)
    }
}

impl AlarmEvaluator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_alarmed(&self, value: f64) -> bool {
        value > self.threshold
    }
}

/// One timestamped measurement with its derived alarm flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub sensor_id: String,
    pub value: f64,
    pub unit: String,
    pub alarmed: bool,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    /// Build a reading, deriving `alarmed` from the evaluator.
    pub fn new(
        sensor_id: &str,
        value: f64,
        unit: &str,
        alarm: &AlarmEvaluator,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            sensor_id: sensor_id.to_string(),
            value,
            unit: unit.to_string(),
            alarmed: alarm.is_alarmed(value),
            timestamp,
        }
    }

    /// The log entry written for this reading.
    pub fn log_entry(&self) -> LogEntry {
        LogEntry {
            timestamp: self.timestamp,
            value: self.value,
            alarmed: self.alarmed,
        }
    }
}

/// Current-value projection for one sensor, overwritten on every reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    pub sensor_id: String,
    pub value: f64,
    pub unit: String,
    pub alarmed: bool,
    pub timestamp: DateTime<Utc>,
}

impl SensorState {
    /// The zeroed record created at startup for a sensor with no state yet.
    pub fn initial(sensor_id: &str, unit: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            sensor_id: sensor_id.to_string(),
            value: 0.0,
            unit: unit.to_string(),
            alarmed: false,
            timestamp,
        }
    }
}

impl From<&Reading> for SensorState {
    fn from(reading: &Reading) -> Self {
        Self {
            sensor_id: reading.sensor_id.clone(),
            value: reading.value,
            unit: reading.unit.clone(),
            alarmed: reading.alarmed,
            timestamp: reading.timestamp,
        }
    }
}

/// A line in a sensor's append-only log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub alarmed: bool,
}

impl LogEntry {
    /// Render as `timestamp | value<unit> | alarmed`.
    pub fn format_line(&self, unit: &str) -> String {
        format!(
            "{} | {:.2}{} | {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.value,
            unit,
            self.alarmed
        )
    }
}
