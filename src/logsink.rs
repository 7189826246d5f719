//! Per-sensor append-only log files.
//!
//! Each sensor writes to `<dir>/<sensor_id>.txt`. A new file starts with a
//! fixed header; afterwards every non-alarm reading adds one line:
//!
//! ```text
//! 2024-05-17 09:30:05 | 31.23°C | false
//! ```

use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::data::LogEntry;
use crate::error::PipelineError;

/// Create the log directory if needed.
///
/// Returns `true` if the directory was created by this call.
pub async fn prepare_dir(dir: &Path) -> std::io::Result<bool> {
    if tokio::fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Ok(false);
    }
    tokio::fs::create_dir_all(dir).await?;
    Ok(true)
}

/// Path of the log file for a sensor.
pub fn log_path(dir: &Path, sensor_id: &str) -> PathBuf {
    dir.join(format!("{}.txt", sensor_id))
}

fn header(sensor_id: &str, unit: &str) -> String {
    format!(
        "Readings for sensor {}:\n\nTimestamp           | Temperature ({}) | Alarm\n{}\n",
        sensor_id,
        unit,
        "-".repeat(49)
    )
}

/// An open, exclusive log file for one sensor.
#[derive(Debug)]
pub struct LogSink {
    sensor_id: String,
    unit: String,
    path: PathBuf,
    file: File,
}

impl LogSink {
    /// Open the sensor's log file for appending, writing the header first if
    /// the file does not exist yet.
    pub async fn open(dir: &Path, sensor_id: &str, unit: &str) -> Result<Self, PipelineError> {
        let path = log_path(dir, sensor_id);
        let fail = |e| PipelineError::log_write(sensor_id, e);

        let mut file = OpenOptions::new().create(true).append(true).open(&path).await.map_err(fail)?;
        let is_new = file.metadata().await.map_err(fail)?.len() == 0;
        if is_new {
            file.write_all(header(sensor_id, unit).as_bytes()).await.map_err(fail)?;
            file.flush().await.map_err(fail)?;
            info!(sensor = sensor_id, path = %path.display(), "created sensor log");
        } else {
            debug!(sensor = sensor_id, path = %path.display(), "appending to existing sensor log");
        }

        Ok(Self {
            sensor_id: sensor_id.to_string(),
            unit: unit.to_string(),
            path,
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a single line.
    pub async fn append(&mut self, entry: &LogEntry) -> Result<(), PipelineError> {
        let mut line = entry.format_line(&self.unit);
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .await
            .map_err(|e| PipelineError::log_write(&self.sensor_id, e))?;
        self.file.flush().await.map_err(|e| PipelineError::log_write(&self.sensor_id, e))
    }
}
