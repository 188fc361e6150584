//! nodestats -- per-node job statistics recorder.
//!
//! Accumulates outcome history and lifetime counters for repeated background
//! jobs run against a managed node, persists them to `stats.json`, and tracks
//! a bounded ring of "last touched" timestamps.

pub mod config;
pub mod error;
pub mod recorder;
pub mod stats;
pub mod storage;

pub use config::StatsConfig;
pub use error::StatsError;
pub use recorder::StatsRecorder;
pub use stats::{HistoryEntry, JobOutcome, JobRecord, Mtime, StatsSnapshot, StatsStore, Status};
pub use storage::LoadOutcome;
