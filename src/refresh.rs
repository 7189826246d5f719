//! Timer-driven refresh of the per-sensor chart panels.
//!
//! The refresher is decoupled from the workers: on every tick it pulls the
//! trailing window of history for each sensor from the store and hands the
//! series to a [`Display`]. It stops only when the display reports closed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::data::{SensorState, Series};
use crate::error::PipelineError;
use crate::store::{ReadingFilter, Store};

/// The redraw boundary: one panel per sensor.
pub trait Display {
    /// Replace the panel for `sensor_id` with a new time-ordered series.
    fn redraw(&mut self, sensor_id: &str, series: Series);

    /// Latest state record for a sensor, delivered alongside each redraw.
    fn update_state(&mut self, _state: &SensorState) {}

    /// Whether the user has dismissed the display.
    fn is_closed(&self) -> bool;
}

/// Polls the store on a fixed interval and redraws every sensor panel.
#[derive(Debug, Clone)]
pub struct WindowedViewRefresher {
    store: Arc<dyn Store>,
    sensor_ids: Vec<String>,
    window: Duration,
    interval: Duration,
}

impl WindowedViewRefresher {
    pub fn new(
        store: Arc<dyn Store>,
        sensor_ids: Vec<String>,
        window: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            sensor_ids,
            window,
            interval,
        }
    }

    pub fn from_settings(settings: &Settings, store: Arc<dyn Store>) -> Self {
        Self::new(
            store,
            settings.sensors.ids.clone(),
            settings.view.window,
            settings.view.refresh,
        )
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn sensor_ids(&self) -> &[String] {
        &self.sensor_ids
    }

    /// Start of the window ending at `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let span = TimeDelta::from_std(self.window).unwrap_or(TimeDelta::MAX);
        now.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// History for one sensor strictly after `now - window`, oldest first.
    pub async fn query_window(
        &self,
        sensor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Series, PipelineError> {
        let filter = ReadingFilter::for_sensor(sensor_id).after(self.window_start(now));
        let readings = self.store.find_readings(&filter).await?;
        Ok(Series::new(readings.into_iter().map(|r| (r.timestamp, r.value)).collect()))
    }

    /// Redraw every panel with the window ending at `now`.
    ///
    /// A sensor whose queries fail keeps its previous panel; the others are
    /// still redrawn. The first failure is returned once every sensor has
    /// been visited.
    pub async fn refresh_at<D>(&self, display: &mut D, now: DateTime<Utc>) -> Result<(), PipelineError>
    where
        D: Display + ?Sized,
    {
        let mut first_error = None;
        for sensor_id in &self.sensor_ids {
            if let Err(e) = self.refresh_sensor(display, sensor_id, now).await {
                warn!(sensor = %sensor_id, error = %e, "panel refresh failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn refresh_sensor<D>(
        &self,
        display: &mut D,
        sensor_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), PipelineError>
    where
        D: Display + ?Sized,
    {
        let series = self.query_window(sensor_id, now).await?;
        let state = self.store.find_state(sensor_id).await?;
        if let Some(state) = state {
            display.update_state(&state);
        }
        debug!(sensor = %sensor_id, points = series.len(), "redrawing panel");
        display.redraw(sensor_id, series);
        Ok(())
    }

    /// Redraw every panel with the window ending now.
    pub async fn refresh<D>(&self, display: &mut D) -> Result<(), PipelineError>
    where
        D: Display + ?Sized,
    {
        self.refresh_at(display, Utc::now()).await
    }

    /// Tick until the display is closed. Returns the number of refreshes.
    ///
    /// A refresh that overruns the interval causes the missed ticks to be
    /// skipped, so refreshes never queue up or overlap. A failed query is
    /// logged and retried on the next tick.
    pub async fn run<D>(&self, display: &mut D) -> u64
    where
        D: Display + ?Sized,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut refreshes = 0;

        loop {
            ticker.tick().await;
            if display.is_closed() {
                break;
            }
            match self.refresh(display).await {
                Ok(()) => refreshes += 1,
                Err(e) => warn!(error = %e, "refresh failed"),
            }
        }

        info!(refreshes, "display closed, refresh loop finished");
        refreshes
    }
}

/// A display that logs each redraw instead of drawing, for headless runs.
///
/// It closes when its token is cancelled.
#[derive(Debug)]
pub struct LogDisplay {
    unit: String,
    closed: CancellationToken,
}

impl LogDisplay {
    pub fn new(unit: &str, closed: CancellationToken) -> Self {
        Self {
            unit: unit.to_string(),
            closed,
        }
    }
}

impl Display for LogDisplay {
    fn redraw(&mut self, sensor_id: &str, series: Series) {
        match series.latest() {
            Some((ts, value)) => info!(
                sensor = sensor_id,
                points = series.len(),
                latest = %ts.format("%H:%M:%S"),
                "window latest {:.2}{}",
                value,
                self.unit
            ),
            None => info!(sensor = sensor_id, "window empty"),
        }
    }

    fn update_state(&mut self, state: &SensorState) {
        if state.alarmed {
            warn!(sensor = %state.sensor_id, value = state.value, "sensor is alarmed");
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AlarmEvaluator, Reading};
    use crate::store::MemoryStore;
    use std::collections::HashMap;

    #[derive(Default)]
    struct RecordingDisplay {
        panels: HashMap<String, Series>,
        states: HashMap<String, SensorState>,
        redraws: usize,
        close_after: Option<usize>,
    }

    impl Display for RecordingDisplay {
        fn redraw(&mut self, sensor_id: &str, series: Series) {
            self.redraws += 1;
            self.panels.insert(sensor_id.to_string(), series);
        }

        fn update_state(&mut self, state: &SensorState) {
            self.states.insert(state.sensor_id.clone(), state.clone());
        }

        fn is_closed(&self) -> bool {
            self.close_after.is_some_and(|n| self.redraws >= n)
        }
    }

    async fn seeded_store(now: DateTime<Utc>) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let alarm = AlarmEvaluator::default();
        let at = |minutes: i64| now - TimeDelta::minutes(minutes);
        for (sensor, value, ts) in [
            ("Temp1", 30.0, at(120)),
            ("Temp1", 33.0, at(1)),
            ("Temp1", 31.0, at(59)),
            ("Temp1", 32.0, at(60)),
            ("Temp2", 39.5, at(2)),
        ] {
            let reading = Reading::new(sensor, value, "°C", &alarm, ts);
            store.upsert_state(SensorState::from(&reading)).await.unwrap();
            store.insert_reading(reading).await.unwrap();
        }
        store
    }

    fn refresher(store: Arc<MemoryStore>) -> WindowedViewRefresher {
        WindowedViewRefresher::new(
            store,
            vec!["Temp1".into(), "Temp2".into(), "Temp3".into()],
            Duration::from_secs(3600),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_window_is_strict_and_ascending() {
        let now = Utc::now();
        let refresher = refresher(seeded_store(now).await);

        let series = refresher.query_window("Temp1", now).await.unwrap();
        let values: Vec<f64> = series.points.iter().map(|(_, v)| *v).collect();
        // exactly one hour old is excluded, two hours old is excluded
        assert_eq!(values, vec![31.0, 33.0]);
        assert!(series.points.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[tokio::test]
    async fn test_refresh_redraws_every_sensor() {
        let now = Utc::now();
        let refresher = refresher(seeded_store(now).await);
        let mut display = RecordingDisplay::default();

        refresher.refresh_at(&mut display, now).await.unwrap();

        assert_eq!(display.redraws, 3);
        assert_eq!(display.panels["Temp1"].len(), 2);
        assert_eq!(display.panels["Temp2"].len(), 1);
        assert!(display.panels["Temp3"].is_empty());
        assert!(display.states["Temp2"].alarmed);
        assert!(!display.states.contains_key("Temp3"));
    }

    /// Fails every query for one sensor and delegates the rest.
    #[derive(Debug)]
    struct FlakyStore {
        inner: Arc<MemoryStore>,
        failing: &'static str,
    }

    #[async_trait::async_trait]
    impl Store for FlakyStore {
        async fn ping(&self) -> Result<(), PipelineError> {
            Ok(())
        }
        async fn find_state(&self, sensor_id: &str) -> Result<Option<SensorState>, PipelineError> {
            self.inner.find_state(sensor_id).await
        }
        async fn insert_state(&self, state: SensorState) -> Result<(), PipelineError> {
            self.inner.insert_state(state).await
        }
        async fn upsert_state(&self, state: SensorState) -> Result<(), PipelineError> {
            self.inner.upsert_state(state).await
        }
        async fn insert_reading(&self, reading: Reading) -> Result<(), PipelineError> {
            self.inner.insert_reading(reading).await
        }
        async fn find_readings(
            &self,
            filter: &ReadingFilter,
        ) -> Result<Vec<Reading>, PipelineError> {
            if filter.sensor_id.as_deref() == Some(self.failing) {
                return Err(PipelineError::StoreUnreachable("query timed out".into()));
            }
            self.inner.find_readings(filter).await
        }
        fn description(&self) -> &str {
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_failed_sensor_does_not_stall_other_panels() {
        let now = Utc::now();
        let store = Arc::new(FlakyStore {
            inner: seeded_store(now).await,
            failing: "Temp1",
        });
        let refresher = WindowedViewRefresher::new(
            store,
            vec!["Temp1".into(), "Temp2".into(), "Temp3".into()],
            Duration::from_secs(3600),
            Duration::from_secs(5),
        );
        let mut display = RecordingDisplay::default();

        let err = refresher.refresh_at(&mut display, now).await.unwrap_err();

        assert!(matches!(err, PipelineError::StoreUnreachable(_)));
        assert!(!display.panels.contains_key("Temp1"));
        assert_eq!(display.panels["Temp2"].len(), 1);
        assert!(display.panels["Temp3"].is_empty());
        assert_eq!(display.redraws, 2);
        assert!(display.states["Temp2"].alarmed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_when_display_closes() {
        let refresher = refresher(seeded_store(Utc::now()).await);
        // three sensors per refresh, close after the second refresh
        let mut display = RecordingDisplay {
            close_after: Some(6),
            ..RecordingDisplay::default()
        };

        let refreshes = refresher.run(&mut display).await;
        assert_eq!(refreshes, 2);
        assert_eq!(display.redraws, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_display_closes_on_cancel() {
        let refresher = refresher(Arc::new(MemoryStore::new()));
        let closed = CancellationToken::new();
        let mut display = LogDisplay::new("°C", closed.clone());
        closed.cancel();
        assert_eq!(refresher.run(&mut display).await, 0);
    }

    #[test]
    fn test_window_start_saturates() {
        let refresher = WindowedViewRefresher::new(
            Arc::new(MemoryStore::new()),
            vec![],
            Duration::from_secs(u64::MAX),
            Duration::from_secs(5),
        );
        assert_eq!(refresher.window_start(Utc::now()), DateTime::<Utc>::MIN_UTC);
    }
}
