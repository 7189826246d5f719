//! Data models for readings, sensor state and chart series.
//!
//! ## Submodules
//!
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "5s", "1h")
//! - [`reading`]: [`Reading`], [`SensorState`], [`LogEntry`] and [`AlarmEvaluator`]
//! - [`series`]: Windowed `(timestamp, value)` series for the chart panels
//!
//! ## Data Flow
//!
//! ```text
//! ValueGenerator sample
//!        │
//!        ▼
//! Reading::new() ──▶ alarmed = value > threshold
//!        │
//!        ├──▶ SensorState (upserted, one per sensor)
//!        ├──▶ store history (appended)
//!        └──▶ LogEntry (appended to the sensor's log file unless alarmed)
//! ```

pub mod duration;
pub mod reading;
pub mod series;

pub use reading::{AlarmEvaluator, LogEntry, Reading, SensorState, DEFAULT_ALARM_THRESHOLD};
pub use series::{Series, SeriesSet};
