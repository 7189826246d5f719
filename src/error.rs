//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Errors raised by the store, the log sinks and configuration loading.
///
/// An alarm is not an error: a worker that sees one stops with
/// [`StopReason::Alarm`](crate::sensor::StopReason::Alarm).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The backing store could not be reached at startup.
    #[error("store unreachable: {0}")]
    StoreUnreachable(String),

    /// A write to the backing store failed for one sensor.
    #[error("store write failed for sensor {sensor_id}: {reason}")]
    StoreWrite { sensor_id: String, reason: String },

    /// Appending to a sensor's log file failed.
    #[error("log write failed for sensor {sensor_id}: {source}")]
    LogWrite {
        sensor_id: String,
        #[source]
        source: std::io::Error,
    },

    /// The sensor log directory could not be created.
    #[error("cannot prepare log directory {}: {source}", path.display())]
    LogDir {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    pub(crate) fn store_write(sensor_id: &str, reason: impl ToString) -> Self {
        PipelineError::StoreWrite {
            sensor_id: sensor_id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn log_write(sensor_id: &str, source: std::io::Error) -> Self {
        PipelineError::LogWrite {
            sensor_id: sensor_id.to_string(),
            source,
        }
    }
}
