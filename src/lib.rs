//! # thermowatch
//!
//! Simulated temperature sensors, a document store and a live terminal chart.
//!
//! Each configured sensor runs as an independent task that produces readings,
//! persists the latest state and the reading history, appends non-alarm
//! readings to a per-sensor text log, and stops as soon as a reading crosses
//! the alarm threshold. A separate refresher periodically pulls the trailing
//! window of history from the store and redraws one chart panel per sensor.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  IngestionCoordinator                                        │
//! │   ├─ SensorWorker(Temp1) ─┐                                  │
//! │   ├─ SensorWorker(Temp2) ─┼──▶ Store ◀── WindowedViewRefresher│
//! │   └─ SensorWorker(Temp3) ─┘      │              │             │
//! │            │                     │              ▼             │
//! │            ▼                     │          Display           │
//! │         LogSink (Temp*.txt)      │     (App + ui / LogDisplay)│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`sensor`]**: value generators, per-sensor workers and the coordinator
//! - **[`store`]**: the [`Store`] trait with in-memory and JSON file backends
//! - **[`logsink`]**: per-sensor append-only text logs
//! - **[`refresh`]**: the windowed refresher and the [`Display`] boundary
//! - **[`app`]**, **[`events`]**, **[`ui`]**: the terminal chart
//! - **[`startup`]**: store and log directory checks run before any worker
//! - **[`config`]**, **[`error`]**, **[`data`]**: settings, errors and models
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use thermowatch::{IngestionCoordinator, MemoryStore, ScriptedGenerator, Settings, Store};
//!
//! # tokio_test::block_on(async {
//! let settings = Settings::default();
//! thermowatch::logsink::prepare_dir(&settings.logs.dir).await.unwrap();
//!
//! let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
//! let coordinator = IngestionCoordinator::new(&settings, store).with_generators(|_, _| {
//!     Box::new(ScriptedGenerator::new(&[31.0, 39.0], Duration::from_millis(10)))
//! });
//! for report in coordinator.run().await {
//!     println!("{}: {:?}", report.sensor_id, report.stop);
//! }
//! # });
//! ```

pub mod app;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod logsink;
pub mod refresh;
pub mod sensor;
pub mod startup;
pub mod store;
pub mod ui;

// Re-export main types for convenience
pub use app::App;
pub use config::Settings;
pub use data::{AlarmEvaluator, LogEntry, Reading, SensorState, Series};
pub use error::PipelineError;
pub use refresh::{Display, LogDisplay, WindowedViewRefresher};
pub use sensor::{
    IngestionCoordinator, RandomGenerator, ScriptedGenerator, SensorWorker, StopReason,
    ValueGenerator, WorkerReport,
};
pub use startup::{startup, Startup};
pub use store::{JsonFileStore, MemoryStore, ReadingFilter, Store};
