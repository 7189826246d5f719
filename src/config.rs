//! Runtime configuration.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `THERMOWATCH` (sections separated by
//! `__`), then command-line overrides applied by the binary.
//!
//! ```toml
//! [sensors]
//! ids = ["Temp1", "Temp2", "Temp3"]
//! min_value = 30.0
//! max_value = 40.0
//! min_delay = "1s"
//! max_delay = "5s"
//!
//! [alarm]
//! threshold = 38.0
//!
//! [ingest]
//! max_readings = 100
//! run_for = "10m"
//!
//! [store]
//! path = "readings.json"
//!
//! [logs]
//! dir = "documents_Temp"
//!
//! [view]
//! refresh = "5s"
//! window = "1h"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::data::duration;
use crate::data::DEFAULT_ALARM_THRESHOLD;
use crate::error::PipelineError;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "THERMOWATCH";

/// Default configuration file, read only if present.
pub const DEFAULT_CONFIG_FILE: &str = "thermowatch.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sensors: SensorSettings,
    pub alarm: AlarmSettings,
    pub ingest: IngestSettings,
    pub store: StoreSettings,
    pub logs: LogSettings,
    pub view: ViewSettings,
}

/// The simulated sensors and their value generators.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    pub ids: Vec<String>,
    pub unit: String,
    pub min_value: f64,
    pub max_value: f64,
    #[serde(deserialize_with = "duration::deserialize")]
    pub min_delay: Duration,
    #[serde(deserialize_with = "duration::deserialize")]
    pub max_delay: Duration,
    /// Base RNG seed; sensor `i` uses `seed + i`. Unset means entropy.
    pub seed: Option<u64>,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            ids: vec!["Temp1".into(), "Temp2".into(), "Temp3".into()],
            unit: "°C".into(),
            min_value: 30.0,
            max_value: 40.0,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlarmSettings {
    pub threshold: f64,
}

impl Default for AlarmSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_ALARM_THRESHOLD,
        }
    }
}

/// Stopping conditions for the ingestion side. Both default to unbounded.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Maximum readings per worker.
    pub max_readings: Option<u64>,
    /// Deadline for the whole ingestion run.
    #[serde(deserialize_with = "duration::deserialize_option")]
    pub run_for: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// JSON document file. `None` keeps everything in memory.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub dir: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("documents_Temp"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    #[serde(deserialize_with = "duration::deserialize")]
    pub refresh: Duration,
    #[serde(deserialize_with = "duration::deserialize")]
    pub window: Duration,
    /// Join every worker before opening the display.
    pub wait_for_ingestion: bool,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            refresh: Duration::from_secs(5),
            window: Duration::from_secs(3600),
            wait_for_ingestion: false,
        }
    }
}

impl Settings {
    /// Load settings from defaults, an optional file and the environment.
    ///
    /// When `path` is given the file must exist; otherwise
    /// [`DEFAULT_CONFIG_FILE`] is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self, PipelineError> {
        let (file, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        let settings: Settings = Config::builder()
            .add_source(File::from(file).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|config| config.try_deserialize::<Settings>())
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let sensors = &self.sensors;
        if sensors.ids.is_empty() {
            return Err(PipelineError::Config("at least one sensor id is required".into()));
        }
        let mut seen = HashSet::new();
        for id in &sensors.ids {
            if id.trim().is_empty() {
                return Err(PipelineError::Config("sensor ids must not be empty".into()));
            }
            if !seen.insert(id.as_str()) {
                return Err(PipelineError::Config(format!("duplicate sensor id: {}", id)));
            }
        }
        if !(sensors.min_value.is_finite() && sensors.max_value.is_finite())
            || sensors.min_value > sensors.max_value
        {
            return Err(PipelineError::Config(format!(
                "invalid value range [{}, {}]",
                sensors.min_value, sensors.max_value
            )));
        }
        if sensors.min_delay > sensors.max_delay {
            return Err(PipelineError::Config(format!(
                "min_delay {:?} exceeds max_delay {:?}",
                sensors.min_delay, sensors.max_delay
            )));
        }
        if !self.alarm.threshold.is_finite() {
            return Err(PipelineError::Config("alarm threshold must be finite".into()));
        }
        if self.view.refresh.is_zero() || self.view.window.is_zero() {
            return Err(PipelineError::Config(
                "view refresh and window must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_simulation() {
        let settings = Settings::default();
        assert_eq!(settings.sensors.ids, vec!["Temp1", "Temp2", "Temp3"]);
        assert_eq!(settings.alarm.threshold, 38.0);
        assert_eq!(settings.view.refresh, Duration::from_secs(5));
        assert_eq!(settings.view.window, Duration::from_secs(3600));
        assert!(settings.ingest.max_readings.is_none());
        assert!(settings.ingest.run_for.is_none());
        assert!(settings.store.path.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[sensors]
ids = ["A", "B"]
min_delay = "10ms"
max_delay = "20ms"

[alarm]
threshold = 35.5

[ingest]
max_readings = 7
run_for = "2m"

[view]
refresh = "1s"
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.sensors.ids, vec!["A", "B"]);
        assert_eq!(settings.sensors.min_delay, Duration::from_millis(10));
        assert_eq!(settings.alarm.threshold, 35.5);
        assert_eq!(settings.ingest.max_readings, Some(7));
        assert_eq!(settings.ingest.run_for, Some(Duration::from_secs(120)));
        assert_eq!(settings.view.refresh, Duration::from_secs(1));
        // untouched sections keep their defaults
        assert_eq!(settings.view.window, Duration::from_secs(3600));
        assert_eq!(settings.sensors.max_value, 40.0);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let err = Settings::load(Some(Path::new("/nonexistent/thermowatch.toml"))).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let mut settings = Settings::default();
        settings.sensors.ids = vec!["Temp1".into(), "Temp1".into()];
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_ranges() {
        let mut settings = Settings::default();
        settings.sensors.min_value = 41.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.sensors.min_delay = Duration::from_secs(10);
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_refresh() {
        let mut settings = Settings::default();
        settings.view.refresh = Duration::ZERO;
        assert!(settings.validate().is_err());
    }
}
