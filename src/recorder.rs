//! Shared, serialized access to a [`StatsStore`].
//!
//! A job scheduler with several workers may finish jobs for the same node at
//! the same time. [`StatsRecorder`] is a cheap-to-clone handle that funnels
//! every mutation through one `tokio::sync::Mutex`, and runs the blocking
//! `stats.json` write on the blocking pool while holding it. Concurrent
//! `add`s therefore never lose an increment or interleave file writes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::StatsConfig;
use crate::error::StatsError;
use crate::stats::{JobOutcome, Mtime, StatsSnapshot, StatsStore};
use crate::storage::LoadOutcome;

#[derive(Clone)]
pub struct StatsRecorder {
    store: Arc<Mutex<StatsStore>>,
}

impl StatsRecorder {
    pub fn new(store: StatsStore) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    /// Open the store for `config` on the blocking pool.
    pub async fn open(config: StatsConfig) -> Result<Self, StatsError> {
        let store = tokio::task::spawn_blocking(move || StatsStore::open(&config)).await??;
        match store.load_outcome() {
            LoadOutcome::Reset { reason } => {
                info!(dir = %store.history_dir().display(), %reason, "stats recorder started with reset stats")
            }
            outcome => {
                info!(dir = %store.history_dir().display(), ?outcome, "stats recorder started")
            }
        }
        Ok(Self::new(store))
    }

    /// Record a completed job. Returns once `stats.json` has been written.
    pub async fn add<J>(&self, job: J) -> Result<(), StatsError>
    where
        J: JobOutcome + Send + 'static,
    {
        let mut store = self.store.clone().lock_owned().await;
        let result = tokio::task::spawn_blocking(move || store.add(&job)).await?;
        if let Err(e) = &result {
            error!(error = %e, "failed to record job outcome");
        }
        result
    }

    /// Push the current time onto the mtime ring and return it.
    pub async fn update_mtime(&self) -> DateTime<Utc> {
        self.store.lock().await.update_mtime()
    }

    pub async fn mtime(&self) -> Mtime {
        self.store.lock().await.mtime()
    }

    pub async fn successes(&self) -> u64 {
        self.store.lock().await.successes()
    }

    pub async fn failures(&self) -> u64 {
        self.store.lock().await.failures()
    }

    pub async fn get_counter(&self, status: &str) -> u64 {
        self.store.lock().await.get_counter(status)
    }

    pub async fn snapshot(&self) -> StatsSnapshot {
        self.store.lock().await.snapshot()
    }
}
