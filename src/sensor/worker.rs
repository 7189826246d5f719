//! The per-sensor worker loop.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::generator::ValueGenerator;
use crate::data::{AlarmEvaluator, Reading, SensorState};
use crate::error::PipelineError;
use crate::logsink::LogSink;
use crate::store::Store;

/// Why a worker stopped.
#[derive(Debug)]
pub enum StopReason {
    /// A reading exceeded the alarm threshold.
    Alarm { value: f64 },
    /// The generator ran out of samples.
    Exhausted,
    /// The configured reading cap was reached.
    LimitReached,
    /// The run was cancelled from outside.
    Cancelled,
    /// A store or log write failed; only this worker is affected.
    Failed(PipelineError),
    /// The worker task panicked or was aborted.
    Aborted(String),
}

impl StopReason {
    pub fn is_alarm(&self) -> bool {
        matches!(self, StopReason::Alarm { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, StopReason::Failed(_) | StopReason::Aborted(_))
    }
}

/// Outcome of one worker, returned by the coordinator's join.
#[derive(Debug)]
pub struct WorkerReport {
    pub sensor_id: String,
    /// Readings built and upserted, including the alarm reading if any.
    pub readings: u64,
    pub stop: StopReason,
}

/// Settings shared by every worker of a run.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub store: Arc<dyn Store>,
    pub alarm: AlarmEvaluator,
    pub unit: String,
    pub log_dir: PathBuf,
    pub max_readings: Option<u64>,
    pub cancel: CancellationToken,
}

enum Step {
    Continue,
    Alarm,
}

/// Drives one generator: builds readings, upserts state, appends the history
/// and log, and stops on the first alarm.
///
/// A worker is the only writer for its sensor id.
pub struct SensorWorker {
    sensor_id: String,
    generator: Box<dyn ValueGenerator>,
    ctx: WorkerContext,
    readings: u64,
}

impl SensorWorker {
    pub fn new(sensor_id: &str, generator: Box<dyn ValueGenerator>, ctx: WorkerContext) -> Self {
        Self {
            sensor_id: sensor_id.to_string(),
            generator,
            ctx,
            readings: 0,
        }
    }

    /// Run until a stop condition and report the outcome.
    pub async fn run(mut self) -> WorkerReport {
        let stop = match self.drive().await {
            Ok(stop) => stop,
            Err(e) => {
                error!(sensor = %self.sensor_id, error = %e, "sensor worker failed");
                StopReason::Failed(e)
            }
        };
        info!(sensor = %self.sensor_id, readings = self.readings, stop = ?stop, "sensor worker stopped");

        WorkerReport {
            sensor_id: self.sensor_id,
            readings: self.readings,
            stop,
        }
    }

    async fn drive(&mut self) -> Result<StopReason, PipelineError> {
        let mut sink = LogSink::open(&self.ctx.log_dir, &self.sensor_id, &self.ctx.unit).await?;

        loop {
            if self.ctx.cancel.is_cancelled() {
                return Ok(StopReason::Cancelled);
            }

            let Some(sample) = self.generator.next_sample() else {
                return Ok(StopReason::Exhausted);
            };

            let reading = Reading::new(
                &self.sensor_id,
                sample.value,
                &self.ctx.unit,
                &self.ctx.alarm,
                Utc::now(),
            );
            self.readings += 1;

            if let Step::Alarm = Self::process(&self.ctx, &self.sensor_id, reading, &mut sink).await? {
                return Ok(StopReason::Alarm {
                    value: sample.value,
                });
            }

            if self.ctx.max_readings.is_some_and(|max| self.readings >= max) {
                return Ok(StopReason::LimitReached);
            }

            tokio::select! {
                _ = self.ctx.cancel.cancelled() => return Ok(StopReason::Cancelled),
                _ = tokio::time::sleep(sample.delay) => {}
            }
        }
    }

    async fn process(
        ctx: &WorkerContext,
        sensor_id: &str,
        reading: Reading,
        sink: &mut LogSink,
    ) -> Result<Step, PipelineError> {
        ctx.store.upsert_state(SensorState::from(&reading)).await?;

        let entry = reading.log_entry();
        ctx.store.insert_reading(reading).await?;

        if entry.alarmed {
            warn!(
                sensor = sensor_id,
                value = entry.value,
                threshold = ctx.alarm.threshold(),
                "temperature too high, check sensor {}", sensor_id
            );
            return Ok(Step::Alarm);
        }

        info!(sensor = sensor_id, "{:.2}{}", entry.value, ctx.unit);
        sink.append(&entry).await?;
        Ok(Step::Continue)
    }
}
