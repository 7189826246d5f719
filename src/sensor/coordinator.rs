//! Spawns one worker per sensor and joins them all.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::generator::{RandomGenerator, ValueGenerator};
use super::worker::{SensorWorker, StopReason, WorkerContext, WorkerReport};
use crate::config::Settings;
use crate::data::{AlarmEvaluator, SensorState};
use crate::error::PipelineError;
use crate::store::Store;

/// Builds the generator for the sensor at a given index of the configured list.
pub type GeneratorFactory = Arc<dyn Fn(usize, &str) -> Box<dyn ValueGenerator> + Send + Sync>;

/// Runs the ingestion side: one concurrent [`SensorWorker`] per sensor id.
///
/// [`run`](Self::run) is a join barrier: it returns only once every worker has
/// stopped, with one [`WorkerReport`] per sensor in configured order.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use thermowatch::config::Settings;
/// use thermowatch::sensor::IngestionCoordinator;
/// use thermowatch::store::MemoryStore;
///
/// # tokio_test::block_on(async {
/// let settings = Settings::default();
/// let coordinator = IngestionCoordinator::new(&settings, Arc::new(MemoryStore::new()));
/// for report in coordinator.run().await {
///     println!("{}: {:?}", report.sensor_id, report.stop);
/// }
/// # });
/// ```
pub struct IngestionCoordinator {
    sensor_ids: Vec<String>,
    ctx: WorkerContext,
    run_for: Option<Duration>,
    factory: GeneratorFactory,
}

impl IngestionCoordinator {
    /// Create a coordinator with random generators built from `settings`.
    pub fn new(settings: &Settings, store: Arc<dyn Store>) -> Self {
        let sensor_settings = settings.sensors.clone();
        let factory: GeneratorFactory =
            Arc::new(move |index: usize, _id: &str| -> Box<dyn ValueGenerator> {
                Box::new(RandomGenerator::from_settings(&sensor_settings, index))
            });

        Self {
            sensor_ids: settings.sensors.ids.clone(),
            ctx: WorkerContext {
                store,
                alarm: AlarmEvaluator::new(settings.alarm.threshold),
                unit: settings.sensors.unit.clone(),
                log_dir: settings.logs.dir.clone(),
                max_readings: settings.ingest.max_readings,
                cancel: CancellationToken::new(),
            },
            run_for: settings.ingest.run_for,
            factory,
        }
    }

    /// Replace the generator factory.
    pub fn with_generators<F>(mut self, factory: F) -> Self
    where
        F: Fn(usize, &str) -> Box<dyn ValueGenerator> + Send + Sync + 'static,
    {
        self.factory = Arc::new(factory);
        self
    }

    /// Token that stops every worker when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.ctx.cancel.clone()
    }

    pub fn sensor_ids(&self) -> &[String] {
        &self.sensor_ids
    }

    /// Spawn all workers and wait for every one of them to stop.
    pub async fn run(self) -> Vec<WorkerReport> {
        let mut set = JoinSet::new();
        let mut task_sensors = HashMap::new();

        for (index, sensor_id) in self.sensor_ids.iter().enumerate() {
            let generator = (self.factory)(index, sensor_id);
            let ctx = self.ctx.clone();
            let id = sensor_id.clone();
            let handle = set.spawn(async move {
                if let Err(e) = ensure_state(ctx.store.as_ref(), &id, &ctx.unit).await {
                    error!(sensor = %id, error = %e, "could not create initial sensor state");
                    return WorkerReport {
                        sensor_id: id,
                        readings: 0,
                        stop: StopReason::Failed(e),
                    };
                }
                SensorWorker::new(&id, generator, ctx).run().await
            });
            task_sensors.insert(handle.id(), sensor_id.clone());
        }
        info!(workers = set.len(), "sensor workers started");

        let deadline = self.run_for.map(|limit| {
            let cancel = self.ctx.cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(limit) => {
                        info!(?limit, "ingestion deadline reached, stopping workers");
                        cancel.cancel();
                    }
                }
            })
        });

        let mut reports = Vec::with_capacity(task_sensors.len());
        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((_, report)) => reports.push(report),
                Err(e) => {
                    let sensor_id = task_sensors.get(&e.id()).cloned().unwrap_or_default();
                    error!(sensor = %sensor_id, error = %e, "sensor worker task did not complete");
                    reports.push(WorkerReport {
                        sensor_id,
                        readings: 0,
                        stop: StopReason::Aborted(e.to_string()),
                    });
                }
            }
        }

        if let Some(handle) = deadline {
            handle.abort();
        }

        let order: HashMap<&str, usize> =
            self.sensor_ids.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
        reports.sort_by_key(|r| order.get(r.sensor_id.as_str()).copied().unwrap_or(usize::MAX));
        info!(workers = reports.len(), "all sensor workers stopped");
        reports
    }
}

/// Create the zeroed state record for a sensor unless one already exists.
pub async fn ensure_state(store: &dyn Store, sensor_id: &str, unit: &str) -> Result<(), PipelineError> {
    if store.find_state(sensor_id).await?.is_some() {
        return Ok(());
    }
    store.insert_state(SensorState::initial(sensor_id, unit, Utc::now())).await?;
    info!(sensor = sensor_id, "created initial sensor state");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::generator::ScriptedGenerator;
    use crate::store::MemoryStore;
    use tempfile::TempDir;

    fn settings(dir: &TempDir) -> Settings {
        let mut settings = Settings::default();
        settings.logs.dir = dir.path().to_path_buf();
        settings
    }

    #[tokio::test]
    async fn test_ensure_state_is_idempotent() {
        let store = MemoryStore::new();
        ensure_state(&store, "Temp1", "°C").await.unwrap();
        let first = store.find_state("Temp1").await.unwrap().unwrap();
        ensure_state(&store, "Temp1", "°C").await.unwrap();
        let second = store.find_state("Temp1").await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(store.state_count(), 1);
    }

    #[tokio::test]
    async fn test_ensure_state_keeps_existing_record() {
        let store = MemoryStore::new();
        let mut state = SensorState::initial("Temp1", "°C", Utc::now());
        state.value = 33.3;
        store.upsert_state(state).await.unwrap();
        ensure_state(&store, "Temp1", "°C").await.unwrap();
        assert_eq!(store.find_state("Temp1").await.unwrap().unwrap().value, 33.3);
    }

    #[tokio::test]
    async fn test_reports_in_configured_order() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let coordinator = IngestionCoordinator::new(&settings(&dir), store.clone())
            .with_generators(|index, _| {
                // Later sensors finish first.
                let count = 3 - index;
                Box::new(ScriptedGenerator::new(&vec![30.0; count], Duration::ZERO))
            });

        let reports = coordinator.run().await;
        let ids: Vec<&str> = reports.iter().map(|r| r.sensor_id.as_str()).collect();
        assert_eq!(ids, vec!["Temp1", "Temp2", "Temp3"]);
        let counts: Vec<u64> = reports.iter().map(|r| r.readings).collect();
        assert_eq!(counts, vec![3, 2, 1]);
        assert_eq!(store.state_count(), 3);
    }

    #[tokio::test]
    async fn test_deadline_cancels_unbounded_workers() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings(&dir);
        settings.ingest.run_for = Some(Duration::from_millis(200));
        settings.sensors.max_value = 35.0;
        settings.sensors.min_delay = Duration::from_millis(10);
        settings.sensors.max_delay = Duration::from_millis(20);
        settings.sensors.seed = Some(11);

        let coordinator = IngestionCoordinator::new(&settings, Arc::new(MemoryStore::new()));
        let reports = tokio::time::timeout(Duration::from_secs(10), coordinator.run())
            .await
            .unwrap();

        assert_eq!(reports.len(), 3);
        for report in &reports {
            assert!(matches!(report.stop, StopReason::Cancelled), "{:?}", report);
            assert!(report.readings >= 1);
        }
    }

    #[tokio::test]
    async fn test_external_cancel_stops_all() {
        let dir = TempDir::new().unwrap();
        let mut settings = settings(&dir);
        settings.sensors.max_value = 35.0;
        settings.sensors.min_delay = Duration::from_secs(60);
        settings.sensors.max_delay = Duration::from_secs(60);

        let coordinator = IngestionCoordinator::new(&settings, Arc::new(MemoryStore::new()));
        let cancel = coordinator.cancellation_token();
        let handle = tokio::spawn(coordinator.run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        let reports = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert!(reports.iter().all(|r| matches!(r.stop, StopReason::Cancelled)));
    }
}
