//! File-backed store.
//!
//! State records live in a small JSON snapshot that is rewritten on every
//! state write. The reading history is a JSON Lines file that only ever grows
//! by appending, so a write costs one line regardless of how long the run has
//! been going.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{Documents, ReadingFilter, Store};
use crate::data::{Reading, SensorState};
use crate::error::PipelineError;

/// On-disk shape of the state snapshot.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateSnapshot {
    #[serde(default)]
    states: BTreeMap<String, SensorState>,
}

/// Borrowed form of [`StateSnapshot`] for writing.
#[derive(Serialize)]
struct StateSnapshotRef<'a> {
    states: &'a BTreeMap<String, SensorState>,
}

/// A store persisted to a JSON state snapshot plus a JSON Lines history.
///
/// The snapshot is replaced atomically (write to a sibling temp file, then
/// rename). In-memory documents change only after the disk write succeeded,
/// so a failed write is never visible to readers.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    history_path: PathBuf,
    description: String,
    docs: Mutex<Documents>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading existing documents if present.
    ///
    /// The history is kept next to the snapshot, see
    /// [`history_path`](Self::history_path). Fails with
    /// [`PipelineError::StoreUnreachable`] if the parent directory does not
    /// exist or either file cannot be read or parsed.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref().to_path_buf();
        check_parent(&path).await?;
        let history_path = path.with_extension("history.jsonl");

        let snapshot: StateSnapshot = match read_optional(&path).await? {
            Some(content) => serde_json::from_str(&content).map_err(|e| {
                PipelineError::StoreUnreachable(format!("Parse error in {}: {}", path.display(), e))
            })?,
            None => StateSnapshot::default(),
        };

        let mut readings = Vec::new();
        if let Some(content) = read_optional(&history_path).await? {
            for (index, line) in content.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let reading = serde_json::from_str(line).map_err(|e| {
                    PipelineError::StoreUnreachable(format!(
                        "Parse error in {} line {}: {}",
                        history_path.display(),
                        index + 1,
                        e
                    ))
                })?;
                readings.push(reading);
            }
        }

        let description = format!("file: {}", path.display());
        Ok(Self {
            path,
            history_path,
            description,
            docs: Mutex::new(Documents {
                states: snapshot.states,
                readings,
            }),
        })
    }

    /// Returns the path of the state snapshot.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the reading history (`<stem>.history.jsonl`).
    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    async fn write_states(
        &self,
        states: &BTreeMap<String, SensorState>,
        sensor_id: &str,
    ) -> Result<(), PipelineError> {
        let fail = |e: std::io::Error| PipelineError::store_write(sensor_id, e);
        let json = serde_json::to_vec(&StateSnapshotRef { states })
            .map_err(|e| PipelineError::store_write(sensor_id, e))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(fail)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(fail)
    }

    async fn append_reading(&self, reading: &Reading) -> Result<(), PipelineError> {
        let fail = |e: std::io::Error| PipelineError::store_write(&reading.sensor_id, e);
        let mut line = serde_json::to_vec(reading)
            .map_err(|e| PipelineError::store_write(&reading.sensor_id, e))?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.history_path)
            .await
            .map_err(fail)?;
        file.write_all(&line).await.map_err(fail)?;
        file.flush().await.map_err(fail)
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, PipelineError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PipelineError::StoreUnreachable(format!(
            "Read error in {}: {}",
            path.display(),
            e
        ))),
    }
}

async fn check_parent(path: &Path) -> Result<(), PipelineError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    match tokio::fs::metadata(parent).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        _ => Err(PipelineError::StoreUnreachable(format!(
            "directory {} does not exist",
            parent.display()
        ))),
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn ping(&self) -> Result<(), PipelineError> {
        check_parent(&self.path).await
    }

    async fn find_state(&self, sensor_id: &str) -> Result<Option<SensorState>, PipelineError> {
        Ok(self.docs.lock().await.states.get(sensor_id).cloned())
    }

    async fn insert_state(&self, state: SensorState) -> Result<(), PipelineError> {
        let sensor_id = state.sensor_id.clone();
        let mut docs = self.docs.lock().await;
        let mut states = docs.states.clone();
        if states.contains_key(&sensor_id) {
            return Err(PipelineError::store_write(&sensor_id, "state record already exists"));
        }
        states.insert(sensor_id.clone(), state);
        self.write_states(&states, &sensor_id).await?;
        docs.states = states;
        Ok(())
    }

    async fn upsert_state(&self, state: SensorState) -> Result<(), PipelineError> {
        let sensor_id = state.sensor_id.clone();
        let mut docs = self.docs.lock().await;
        let mut states = docs.states.clone();
        states.insert(sensor_id.clone(), state);
        self.write_states(&states, &sensor_id).await?;
        docs.states = states;
        Ok(())
    }

    async fn insert_reading(&self, reading: Reading) -> Result<(), PipelineError> {
        let mut docs = self.docs.lock().await;
        self.append_reading(&reading).await?;
        docs.readings.push(reading);
        Ok(())
    }

    async fn find_readings(&self, filter: &ReadingFilter) -> Result<Vec<Reading>, PipelineError> {
        Ok(self.docs.lock().await.find_readings(filter))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AlarmEvaluator;
    use chrono::Utc;
    use tempfile::TempDir;

    fn reading(sensor: &str, value: f64) -> Reading {
        Reading::new(sensor, value, "°C", &AlarmEvaluator::default(), Utc::now())
    }

    #[tokio::test]
    async fn test_open_missing_directory_is_unreachable() {
        let err = JsonFileStore::open("/nonexistent/dir/readings.json").await.unwrap_err();
        assert!(matches!(err, PipelineError::StoreUnreachable(_)));
    }

    #[tokio::test]
    async fn test_open_invalid_json_is_unreachable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("readings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let err = JsonFileStore::open(&path).await.unwrap_err();
        assert!(err.to_string().contains("Parse error"));
    }

    #[tokio::test]
    async fn test_open_invalid_history_line_is_unreachable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("readings.json");
        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store.insert_reading(reading("Temp1", 31.0)).await.unwrap();
        }
        let history = path.with_extension("history.jsonl");
        let mut content = std::fs::read_to_string(&history).unwrap();
        content.push_str("{truncated\n");
        std::fs::write(&history, content).unwrap();

        let err = JsonFileStore::open(&path).await.unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("readings.json");

        {
            let store = JsonFileStore::open(&path).await.unwrap();
            store.ping().await.unwrap();
            store.insert_state(SensorState::initial("Temp1", "°C", Utc::now())).await.unwrap();
            let reading = reading("Temp1", 36.5);
            store.upsert_state(SensorState::from(&reading)).await.unwrap();
            store.insert_reading(reading).await.unwrap();
        }

        let store = JsonFileStore::open(&path).await.unwrap();
        let state = store.find_state("Temp1").await.unwrap().unwrap();
        assert_eq!(state.value, 36.5);
        let history = store.find_readings(&ReadingFilter::for_sensor("Temp1")).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(store.description(), format!("file: {}", path.display()));
    }

    #[tokio::test]
    async fn test_history_is_appended_not_rewritten() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path().join("docs.json")).await.unwrap();
        for value in [30.0, 31.0, 32.0] {
            store.insert_reading(reading("Temp1", value)).await.unwrap();
        }
        store.upsert_state(SensorState::from(&reading("Temp1", 32.0))).await.unwrap();

        let history = std::fs::read_to_string(store.history_path()).unwrap();
        assert_eq!(history.lines().count(), 3);
        let snapshot: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert!(snapshot.get("readings").is_none());
        assert_eq!(snapshot["states"]["Temp1"]["value"], 32.0);
    }

    #[tokio::test]
    async fn test_failed_writes_are_not_visible() {
        let dir = TempDir::new().unwrap();
        let store_dir = dir.path().join("store");
        std::fs::create_dir(&store_dir).unwrap();
        let store = JsonFileStore::open(store_dir.join("docs.json")).await.unwrap();
        store.upsert_state(SensorState::from(&reading("Temp1", 31.0))).await.unwrap();
        store.insert_reading(reading("Temp1", 31.0)).await.unwrap();

        std::fs::remove_dir_all(&store_dir).unwrap();

        let failed = reading("Temp1", 39.9);
        assert!(matches!(
            store.upsert_state(SensorState::from(&failed)).await,
            Err(PipelineError::StoreWrite { .. })
        ));
        assert!(matches!(
            store.insert_reading(failed).await,
            Err(PipelineError::StoreWrite { .. })
        ));
        assert!(matches!(
            store.insert_state(SensorState::initial("Temp2", "°C", Utc::now())).await,
            Err(PipelineError::StoreWrite { .. })
        ));

        assert_eq!(store.find_state("Temp1").await.unwrap().unwrap().value, 31.0);
        assert!(store.find_state("Temp2").await.unwrap().is_none());
        let history = store.find_readings(&ReadingFilter::default()).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].value, 31.0);
    }

    #[tokio::test]
    async fn test_insert_state_twice_fails() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path().join("s.json")).await.unwrap();
        let state = SensorState::initial("Temp2", "°C", Utc::now());
        store.insert_state(state.clone()).await.unwrap();
        assert!(matches!(
            store.insert_state(state).await,
            Err(PipelineError::StoreWrite { .. })
        ));
    }
}
