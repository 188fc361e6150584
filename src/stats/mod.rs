//! Per-node job statistics.
//!
//! A [`StatsStore`] keeps, for one tracked node:
//! - a capped history of job timings per status,
//! - a lifetime counter per status,
//! - a fixed-length ring of recent "touch" timestamps (`mtime`).
//!
//! History and counters are written to `stats.json` after every [`StatsStore::add`]
//! and restored on open. The mtime ring lives in memory only and starts out as
//! all `unknown` on every open.
//!
//! `update_mtime` is never called by `add`. Callers that want "last time the
//! node actually changed" must call it themselves.

pub mod history;
pub mod mtime;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::StatsConfig;
use crate::error::StatsError;
use crate::storage::{self, LoadOutcome, StatsFile};

pub use self::history::{HistoryEntry, JobOutcome, JobRecord, Status};
pub use self::mtime::{Mtime, MtimeRing};

pub struct StatsStore {
    history_size: usize,
    history_dir: PathBuf,
    data: StatsFile,
    mtimes: MtimeRing,
    load_outcome: LoadOutcome,
}

/// Owned copy of a store's state, for readers outside the owning task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub history: BTreeMap<Status, Vec<HistoryEntry>>,
    pub counters: BTreeMap<Status, u64>,
    pub successes: u64,
    pub failures: u64,
    pub mtimes: Vec<Mtime>,
}

impl StatsStore {
    /// Create a store for `config` and restore any persisted state.
    ///
    /// A missing or corrupt `stats.json` leaves the store empty; see
    /// [`StatsStore::load_outcome`]. Fails on invalid configuration, or when
    /// an existing `stats.json` cannot be read.
    pub fn open(config: &StatsConfig) -> Result<Self, StatsError> {
        config.validate()?;

        let mut store = Self {
            history_size: config.history_size,
            history_dir: config.history_dir.clone(),
            data: StatsFile::default(),
            mtimes: MtimeRing::new(config.history_size),
            load_outcome: LoadOutcome::Missing,
        };
        store.load_from_file()?;
        Ok(store)
    }

    /// Record a completed job and persist the store.
    ///
    /// The oldest entry of the status bucket is dropped only when the bucket
    /// already holds more than `history_size` entries before the append, so a
    /// bucket settles at `history_size + 1` entries.
    ///
    /// On a write error the in-memory update is kept and the error returned.
    pub fn add<J: JobOutcome + ?Sized>(&mut self, job: &J) -> Result<(), StatsError> {
        let status = job.status();
        if status.is_reserved() {
            return Err(StatsError::ReservedStatus(status.to_string()));
        }

        let entry = HistoryEntry::from_job(job);
        let bucket = self.data.history.entry(status.clone()).or_default();
        if bucket.len() > self.history_size {
            bucket.remove(0);
        }
        bucket.push(entry);

        let count = self.data.counter.entry(status.clone()).or_insert(0);
        *count += 1;
        debug!(%status, count = *count, "recorded job outcome");

        self.save_to_file()
    }

    /// History bucket for `status`, oldest first. Empty if never recorded.
    pub fn get(&self, status: &str) -> &[HistoryEntry] {
        self.data
            .history
            .get(status)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every history bucket.
    pub fn history(&self) -> &BTreeMap<Status, Vec<HistoryEntry>> {
        &self.data.history
    }

    /// Lifetime count for `status`, 0 if never recorded.
    pub fn get_counter(&self, status: &str) -> u64 {
        self.data.counter.get(status).copied().unwrap_or(0)
    }

    /// Every lifetime counter.
    pub fn counters(&self) -> &BTreeMap<Status, u64> {
        &self.data.counter
    }

    pub fn successes(&self) -> u64 {
        self.get_counter(Status::SUCCESS)
    }

    /// Sum of every counter other than `success`.
    pub fn failures(&self) -> u64 {
        self.data
            .counter
            .iter()
            .filter(|(status, _)| !status.is_success())
            .map(|(_, count)| *count)
            .sum()
    }

    /// Most recent touch, or `Mtime::Unknown` if never touched since open.
    pub fn mtime(&self) -> Mtime {
        self.mtimes.latest()
    }

    pub fn mtimes(&self) -> &MtimeRing {
        &self.mtimes
    }

    /// Push the current UTC time onto the mtime ring and return it.
    pub fn update_mtime(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        self.update_mtime_at(now);
        now
    }

    pub fn update_mtime_at(&mut self, ts: DateTime<Utc>) {
        self.mtimes.push(ts);
    }

    pub fn history_size(&self) -> usize {
        self.history_size
    }

    pub fn history_dir(&self) -> &Path {
        &self.history_dir
    }

    pub fn stats_path(&self) -> PathBuf {
        storage::stats_path(&self.history_dir)
    }

    /// Result of the most recent [`StatsStore::load_from_file`].
    pub fn load_outcome(&self) -> &LoadOutcome {
        &self.load_outcome
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            history: self.data.history.clone(),
            counters: self.data.counter.clone(),
            successes: self.successes(),
            failures: self.failures(),
            mtimes: self.mtimes.iter().copied().collect(),
        }
    }

    /// Write history and counters to `stats.json`.
    pub fn save_to_file(&self) -> Result<(), StatsError> {
        let path = storage::write(&self.history_dir, &self.data)?;
        debug!(path = %path.display(), "saved stats");
        Ok(())
    }

    /// Replace history and counters with the persisted state, if any.
    ///
    /// A missing file leaves the store untouched. A malformed file resets
    /// history and counters to empty. Any other read error is returned and
    /// leaves the in-memory state as it was.
    pub fn load_from_file(&mut self) -> Result<&LoadOutcome, StatsError> {
        self.load_outcome = match storage::read(&self.history_dir) {
            Ok(None) => LoadOutcome::Missing,
            Ok(Some(file)) => {
                let statuses = file.history.len();
                self.data = file;
                debug!(path = %self.stats_path().display(), statuses, "loaded stats");
                LoadOutcome::Loaded { statuses }
            }
            Err(e @ StatsError::Parse { .. }) => {
                warn!(error = %e, "malformed stats file, starting from empty stats");
                self.data = StatsFile::default();
                LoadOutcome::Reset {
                    reason: e.to_string(),
                }
            }
            Err(e) => return Err(e),
        };
        Ok(&self.load_outcome)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
