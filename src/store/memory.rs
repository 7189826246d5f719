//! In-memory store.

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Documents, ReadingFilter, Store};
use crate::data::{Reading, SensorState};
use crate::error::PipelineError;

/// A store that keeps all documents in process memory.
///
/// Always reachable. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<Documents>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of state records.
    pub fn state_count(&self) -> usize {
        self.docs.read().states.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    async fn find_state(&self, sensor_id: &str) -> Result<Option<SensorState>, PipelineError> {
        Ok(self.docs.read().states.get(sensor_id).cloned())
    }

    async fn insert_state(&self, state: SensorState) -> Result<(), PipelineError> {
        self.docs.write().insert_state(state)
    }

    async fn upsert_state(&self, state: SensorState) -> Result<(), PipelineError> {
        self.docs.write().upsert_state(state);
        Ok(())
    }

    async fn insert_reading(&self, reading: Reading) -> Result<(), PipelineError> {
        self.docs.write().readings.push(reading);
        Ok(())
    }

    async fn find_readings(&self, filter: &ReadingFilter) -> Result<Vec<Reading>, PipelineError> {
        Ok(self.docs.read().find_readings(filter))
    }

    fn description(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AlarmEvaluator;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_upsert_never_duplicates() {
        let store = MemoryStore::new();
        let alarm = AlarmEvaluator::default();
        store.insert_state(SensorState::initial("Temp1", "°C", Utc::now())).await.unwrap();

        for value in [31.0, 35.0, 39.0] {
            let reading = Reading::new("Temp1", value, "°C", &alarm, Utc::now());
            store.upsert_state(SensorState::from(&reading)).await.unwrap();
        }

        assert_eq!(store.state_count(), 1);
        let state = store.find_state("Temp1").await.unwrap().unwrap();
        assert_eq!(state.value, 39.0);
        assert!(state.alarmed);
    }

    #[tokio::test]
    async fn test_upsert_inserts_when_absent() {
        let store = MemoryStore::new();
        let reading = Reading::new("Temp9", 33.0, "°C", &AlarmEvaluator::default(), Utc::now());
        store.upsert_state(SensorState::from(&reading)).await.unwrap();
        assert!(store.find_state("Temp9").await.unwrap().is_some());
        assert!(store.find_state("Temp1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_window_query() {
        let store = MemoryStore::new();
        let alarm = AlarmEvaluator::default();
        let now = Utc::now();
        let old = now - Duration::minutes(61);
        store.insert_reading(Reading::new("Temp1", 30.0, "°C", &alarm, old)).await.unwrap();
        store
            .insert_reading(Reading::new("Temp1", 31.0, "°C", &alarm, now - Duration::minutes(5)))
            .await
            .unwrap();
        store.insert_reading(Reading::new("Temp2", 32.0, "°C", &alarm, now)).await.unwrap();

        let filter = ReadingFilter::for_sensor("Temp1").after(now - Duration::hours(1));
        let found = store.find_readings(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, 31.0);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_to_distinct_keys() {
        let store = Arc::new(MemoryStore::new());
        let alarm = AlarmEvaluator::default();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("S{}", i);
                for n in 0..50 {
                    let reading = Reading::new(&id, 30.0 + n as f64 / 10.0, "°C", &alarm, Utc::now());
                    store.upsert_state(SensorState::from(&reading)).await.unwrap();
                    store.insert_reading(reading).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.state_count(), 8);
        let history = store.find_readings(&ReadingFilter::for_sensor("S3")).await.unwrap();
        assert_eq!(history.len(), 50);
    }
}
