//! Store abstraction for sensor state and reading history.
//!
//! The store keeps two collections:
//!
//! - **states**: one [`SensorState`] per sensor id, upserted on every reading
//! - **readings**: the append-only history of [`Reading`]s that the chart
//!   refresher queries over a trailing window
//!
//! Writes to distinct sensor ids never contend on anything wider than one
//! operation; there are no cross-key transactions.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::data::{Reading, SensorState};
use crate::error::PipelineError;

/// Trait for the backing store used by workers and the refresher.
///
/// # Example
///
/// ```
/// use thermowatch::store::{MemoryStore, ReadingFilter, Store};
///
/// # tokio_test::block_on(async {
/// let store = MemoryStore::new();
/// store.ping().await.unwrap();
/// let history = store.find_readings(&ReadingFilter::for_sensor("Temp1")).await.unwrap();
/// assert!(history.is_empty());
/// # });
/// ```
#[async_trait]
pub trait Store: Send + Sync + Debug {
    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), PipelineError>;

    /// Find the state record for a sensor.
    async fn find_state(&self, sensor_id: &str) -> Result<Option<SensorState>, PipelineError>;

    /// Insert a new state record. Fails if one already exists for the sensor.
    async fn insert_state(&self, state: SensorState) -> Result<(), PipelineError>;

    /// Replace the state record for a sensor, inserting it if absent.
    async fn upsert_state(&self, state: SensorState) -> Result<(), PipelineError>;

    /// Append a reading to the history.
    async fn insert_reading(&self, reading: Reading) -> Result<(), PipelineError>;

    /// Readings matching the filter, in ascending timestamp order.
    async fn find_readings(&self, filter: &ReadingFilter) -> Result<Vec<Reading>, PipelineError>;

    /// Human-readable description, shown in the status bar.
    fn description(&self) -> &str;
}

/// Filter for history queries: exact sensor id and/or timestamp strictly
/// after a point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingFilter {
    pub sensor_id: Option<String>,
    pub after: Option<DateTime<Utc>>,
}

impl ReadingFilter {
    pub fn for_sensor(sensor_id: &str) -> Self {
        Self {
            sensor_id: Some(sensor_id.to_string()),
            after: None,
        }
    }

    pub fn after(mut self, after: DateTime<Utc>) -> Self {
        self.after = Some(after);
        self
    }

    pub fn matches(&self, reading: &Reading) -> bool {
        if let Some(ref id) = self.sensor_id {
            if &reading.sensor_id != id {
                return false;
            }
        }
        match self.after {
            Some(after) => reading.timestamp > after,
            None => true,
        }
    }
}

/// The documents held by a store, shared by the in-memory and file backends.
#[derive(Debug, Clone, Default)]
pub(crate) struct Documents {
    pub states: BTreeMap<String, SensorState>,
    pub readings: Vec<Reading>,
}

impl Documents {
    fn insert_state(&mut self, state: SensorState) -> Result<(), PipelineError> {
        if self.states.contains_key(&state.sensor_id) {
            return Err(PipelineError::store_write(
                &state.sensor_id,
                "state record already exists",
            ));
        }
        self.states.insert(state.sensor_id.clone(), state);
        Ok(())
    }

    fn upsert_state(&mut self, state: SensorState) {
        self.states.insert(state.sensor_id.clone(), state);
    }

    fn find_readings(&self, filter: &ReadingFilter) -> Vec<Reading> {
        let mut found: Vec<Reading> =
            self.readings.iter().filter(|r| filter.matches(r)).cloned().collect();
        // Stable: equal timestamps keep insertion order.
        found.sort_by_key(|r| r.timestamp);
        found
    }
}
