//! Application state for the terminal chart display.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::Settings;
use crate::data::{SensorState, Series, SeriesSet};
use crate::refresh::Display;
use crate::sensor::WorkerReport;
use crate::ui::Theme;

/// Display status of one sensor, derived from its latest state record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SensorStatus {
    /// No state record seen yet.
    Waiting,
    Normal,
    Alarmed,
}

impl SensorStatus {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            SensorStatus::Waiting => "--",
            SensorStatus::Normal => "OK",
            SensorStatus::Alarmed => "ALARM",
        }
    }
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub show_help: bool,

    // Configuration echoed in the UI
    pub sensor_ids: Vec<String>,
    pub unit: String,
    pub threshold: f64,
    pub value_range: [f64; 2],
    pub window: Duration,
    pub refresh_interval: Duration,
    store_description: String,

    // Latest redraw
    pub series: SeriesSet,
    pub states: HashMap<String, SensorState>,
    pub last_refresh: Option<Instant>,
    pub refresh_requested: bool,
    pub load_error: Option<String>,

    // Ingestion outcome, once every worker has stopped
    pub ingestion_summary: Option<String>,

    // Navigation
    pub selected: usize,

    // UI
    pub theme: Theme,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create a new App for the configured sensors.
    pub fn new(settings: &Settings, store_description: &str) -> Self {
        Self::with_theme(settings, store_description, Theme::auto_detect())
    }

    /// Create a new App with an explicit theme.
    pub fn with_theme(settings: &Settings, store_description: &str, theme: Theme) -> Self {
        Self {
            running: true,
            show_help: false,
            sensor_ids: settings.sensors.ids.clone(),
            unit: settings.sensors.unit.clone(),
            threshold: settings.alarm.threshold,
            value_range: [settings.sensors.min_value, settings.sensors.max_value],
            window: settings.view.window,
            refresh_interval: settings.view.refresh,
            store_description: store_description.to_string(),
            series: SeriesSet::new(),
            states: HashMap::new(),
            last_refresh: None,
            refresh_requested: true,
            load_error: None,
            ingestion_summary: None,
            selected: 0,
            theme,
            status_message: None,
        }
    }

    /// Returns a description of the backing store.
    pub fn store_description(&self) -> &str {
        &self.store_description
    }

    /// Whether a refresh is due, either on the timer or on request.
    pub fn refresh_due(&self) -> bool {
        self.refresh_requested
            || self.last_refresh.is_none_or(|at| at.elapsed() >= self.refresh_interval)
    }

    /// Record the outcome of a refresh.
    pub fn mark_refreshed(&mut self, error: Option<String>) {
        self.last_refresh = Some(Instant::now());
        self.refresh_requested = false;
        self.load_error = error;
    }

    pub fn request_refresh(&mut self) {
        self.refresh_requested = true;
    }

    /// Status of a sensor from its latest state record.
    pub fn sensor_status(&self, sensor_id: &str) -> SensorStatus {
        match self.states.get(sensor_id) {
            None => SensorStatus::Waiting,
            Some(state) if state.alarmed => SensorStatus::Alarmed,
            Some(_) => SensorStatus::Normal,
        }
    }

    /// Summarize worker reports once ingestion has finished.
    pub fn set_ingestion_finished(&mut self, reports: &[WorkerReport]) {
        let alarms = reports.iter().filter(|r| r.stop.is_alarm()).count();
        let failures = reports.iter().filter(|r| r.stop.is_failure()).count();
        let readings: u64 = reports.iter().map(|r| r.readings).sum();
        self.ingestion_summary = Some(format!(
            "ingestion finished: {} readings, {} alarmed, {} failed",
            readings, alarms, failures
        ));
        self.request_refresh();
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired (3 seconds).
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < Duration::from_secs(3) {
                return Some(msg);
            }
        }
        None
    }

    /// Move the highlighted panel down.
    pub fn select_next(&mut self) {
        let max = self.sensor_ids.len().saturating_sub(1);
        self.selected = (self.selected + 1).min(max);
    }

    /// Move the highlighted panel up.
    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Export the current window of every sensor to a JSON file.
    pub fn export_window(&self, path: &std::path::Path) -> anyhow::Result<()> {
        use std::io::Write;

        if self.last_refresh.is_none() {
            anyhow::bail!("No data to export");
        }

        let sensors: Vec<serde_json::Value> = self
            .sensor_ids
            .iter()
            .map(|id| {
                let points: Vec<serde_json::Value> = self
                    .series
                    .get(id)
                    .map(|s| {
                        s.points
                            .iter()
                            .map(|(ts, v)| serde_json::json!({ "timestamp": ts, "value": v }))
                            .collect()
                    })
                    .unwrap_or_default();
                serde_json::json!({
                    "sensor_id": id,
                    "status": format!("{:?}", self.sensor_status(id)),
                    "state": self.states.get(id),
                    "points": points,
                })
            })
            .collect();

        let export = serde_json::json!({
            "unit": self.unit,
            "threshold": self.threshold,
            "window_secs": self.window.as_secs(),
            "sensors": sensors,
        });

        let json = serde_json::to_string_pretty(&export)?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(json.as_bytes())?;

        Ok(())
    }
}

impl Display for App {
    fn redraw(&mut self, sensor_id: &str, series: Series) {
        self.series.replace(sensor_id, series);
    }

    fn update_state(&mut self, state: &SensorState) {
        self.states.insert(state.sensor_id.clone(), state.clone());
    }

    fn is_closed(&self) -> bool {
        !self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AlarmEvaluator, Reading};
    use crate::sensor::StopReason;
    use chrono::Utc;
    use tempfile::TempDir;

    fn app() -> App {
        App::with_theme(&Settings::default(), "memory", Theme::dark())
    }

    #[test]
    fn test_display_impl_updates_panels() {
        let mut app = app();
        let now = Utc::now();
        app.redraw("Temp1", Series::new(vec![(now, 31.0)]));
        let reading = Reading::new("Temp1", 39.0, "°C", &AlarmEvaluator::default(), now);
        app.update_state(&SensorState::from(&reading));

        assert_eq!(app.series.get("Temp1").unwrap().len(), 1);
        assert_eq!(app.sensor_status("Temp1"), SensorStatus::Alarmed);
        assert_eq!(app.sensor_status("Temp2"), SensorStatus::Waiting);
    }

    #[test]
    fn test_quit_closes_display() {
        let mut app = app();
        assert!(!app.is_closed());
        app.quit();
        assert!(app.is_closed());
    }

    #[test]
    fn test_refresh_due() {
        let mut app = app();
        assert!(app.refresh_due());
        app.mark_refreshed(None);
        assert!(!app.refresh_due());
        app.request_refresh();
        assert!(app.refresh_due());
    }

    #[test]
    fn test_selection_is_clamped() {
        let mut app = app();
        app.select_prev();
        assert_eq!(app.selected, 0);
        for _ in 0..10 {
            app.select_next();
        }
        assert_eq!(app.selected, 2);
    }

    #[test]
    fn test_ingestion_summary() {
        let mut app = app();
        let reports = vec![
            WorkerReport { sensor_id: "Temp1".into(), readings: 4, stop: StopReason::Exhausted },
            WorkerReport {
                sensor_id: "Temp2".into(),
                readings: 3,
                stop: StopReason::Alarm { value: 39.4 },
            },
        ];
        app.mark_refreshed(None);
        app.set_ingestion_finished(&reports);
        assert_eq!(
            app.ingestion_summary.as_deref(),
            Some("ingestion finished: 7 readings, 1 alarmed, 0 failed")
        );
        assert!(app.refresh_due());
    }

    #[test]
    fn test_export_window() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("window_export.json");
        let mut app = app();
        assert!(app.export_window(&path).is_err());

        app.redraw("Temp1", Series::new(vec![(Utc::now(), 31.5)]));
        app.mark_refreshed(None);
        app.export_window(&path).unwrap();

        let exported: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(exported["sensors"][0]["sensor_id"], "Temp1");
        assert_eq!(exported["sensors"][0]["points"][0]["value"], 31.5);
        assert_eq!(exported["sensors"][2]["points"].as_array().unwrap().len(), 0);
    }
}
