//! Startup checks that must pass before any worker is spawned.
//!
//! The order matters: the store is opened and pinged first, so an
//! unreachable store aborts the run before the log directory or any log file
//! is created.

use std::sync::Arc;

use crate::config::Settings;
use crate::error::PipelineError;
use crate::logsink;
use crate::store::{JsonFileStore, MemoryStore, Store};

/// Resources ready for ingestion.
#[derive(Debug)]
pub struct Startup {
    pub store: Arc<dyn Store>,
    /// Whether the log directory was created by this run.
    pub log_dir_created: bool,
}

/// Open the configured store and check that it is reachable.
///
/// `store.path` selects a [`JsonFileStore`]; otherwise documents are kept in
/// a [`MemoryStore`].
pub async fn open_store(settings: &Settings) -> Result<Arc<dyn Store>, PipelineError> {
    let store: Arc<dyn Store> = match settings.store.path {
        Some(ref path) => Arc::new(JsonFileStore::open(path).await?),
        None => Arc::new(MemoryStore::new()),
    };
    store.ping().await?;
    Ok(store)
}

/// Open and ping the store, then prepare the log directory.
pub async fn startup(settings: &Settings) -> Result<Startup, PipelineError> {
    let store = open_store(settings).await?;
    let dir = &settings.logs.dir;
    let log_dir_created = logsink::prepare_dir(dir).await.map_err(|source| PipelineError::LogDir {
        path: dir.clone(),
        source,
    })?;
    Ok(Startup {
        store,
        log_dir_created,
    })
}
