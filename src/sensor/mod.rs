//! Sensor simulation and ingestion.
//!
//! ```text
//! IngestionCoordinator
//!   │  spawns one task per sensor id, then joins them all
//!   ├──▶ SensorWorker("Temp1") ◀── ValueGenerator
//!   ├──▶ SensorWorker("Temp2") ◀── ValueGenerator
//!   └──▶ SensorWorker("Temp3") ◀── ValueGenerator
//!              │
//!              ├──▶ Store (state upsert + history append)
//!              └──▶ LogSink (one file per sensor)
//! ```

mod coordinator;
mod generator;
mod worker;

pub use coordinator::{ensure_state, GeneratorFactory, IngestionCoordinator};
pub use generator::{RandomGenerator, Sample, ScriptedGenerator, ValueGenerator};
pub use worker::{SensorWorker, StopReason, WorkerContext, WorkerReport};
