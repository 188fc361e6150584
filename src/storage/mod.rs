//! On-disk layer for `stats.json`.
//!
//! The document is a single JSON object: one key per status mapping to that
//! status' history bucket, plus a `"counter"` key mapping status to lifetime
//! count. Writes go to a sibling temp file which is then renamed over the
//! target, so a reader never sees a half-written document.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StatsError;
use crate::stats::{HistoryEntry, Status};

pub const STATS_FILE_NAME: &str = "stats.json";
const STATS_TMP_NAME: &str = "stats.json.tmp";

/// Persisted portion of a stats store. Recency timestamps are not included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsFile {
    #[serde(flatten)]
    pub history: BTreeMap<Status, Vec<HistoryEntry>>,
    #[serde(default)]
    pub counter: BTreeMap<Status, u64>,
}

/// What happened when a store looked for persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No `stats.json` yet; the store starts empty.
    Missing,
    /// State restored from disk.
    Loaded { statuses: usize },
    /// The file existed but could not be used; the store was reset to empty.
    Reset { reason: String },
}

impl LoadOutcome {
    pub fn is_reset(&self) -> bool {
        matches!(self, LoadOutcome::Reset { .. })
    }
}

pub fn stats_path(dir: &Path) -> PathBuf {
    dir.join(STATS_FILE_NAME)
}

/// Read `stats.json` from `dir`. `Ok(None)` if the file does not exist.
pub fn read(dir: &Path) -> Result<Option<StatsFile>, StatsError> {
    let path = stats_path(dir);
    let data = match fs::read(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StatsError::io(path, e)),
    };

    let file = serde_json::from_slice(&data).map_err(|source| StatsError::Parse {
        path: path.clone(),
        source,
    })?;
    Ok(Some(file))
}

/// Write `file` to `dir/stats.json`, creating `dir` if needed.
pub fn write(dir: &Path, file: &StatsFile) -> Result<PathBuf, StatsError> {
    fs::create_dir_all(dir).map_err(|e| StatsError::io(dir, e))?;

    let json = serde_json::to_vec(file)?;
    let path = stats_path(dir);
    let tmp_path = dir.join(STATS_TMP_NAME);

    {
        let mut tmp = fs::File::create(&tmp_path).map_err(|e| StatsError::io(&tmp_path, e))?;
        tmp.write_all(&json).map_err(|e| StatsError::io(&tmp_path, e))?;
        tmp.sync_all().map_err(|e| StatsError::io(&tmp_path, e))?;
    }

    fs::rename(&tmp_path, &path).map_err(|e| StatsError::io(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn entry(secs: u32) -> HistoryEntry {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, secs).unwrap();
        HistoryEntry {
            start,
            end: start + chrono::Duration::seconds(2),
            elapsed: Duration::from_secs(2),
        }
    }

    fn sample() -> StatsFile {
        let mut file = StatsFile::default();
        file.history.insert(Status::success(), vec![entry(0), entry(10)]);
        file.history.insert(Status::new("timeout"), vec![entry(20)]);
        file.counter.insert(Status::success(), 7);
        file.counter.insert(Status::new("timeout"), 1);
        file
    }

    #[test]
    fn test_document_shape() {
        let value = serde_json::to_value(sample()).unwrap();

        assert_eq!(value["success"].as_array().unwrap().len(), 2);
        assert_eq!(value["success"][0]["start"], "2024-05-01T08:00:00Z");
        assert_eq!(value["success"][0]["time"], 2.0);
        assert_eq!(value["timeout"].as_array().unwrap().len(), 1);
        assert_eq!(value["counter"]["success"], 7);
        assert_eq!(value["counter"]["timeout"], 1);
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write(dir.path(), &sample()).unwrap();

        assert_eq!(path, dir.path().join("stats.json"));
        assert!(!dir.path().join("stats.json.tmp").exists());
        assert_eq!(read(dir.path()).unwrap(), Some(sample()));
    }

    #[test]
    fn test_write_creates_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let nested = dir.path().join("a/b/c");

        write(&nested, &StatsFile::default()).unwrap();
        assert!(nested.join("stats.json").exists());
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(read(dir.path()).unwrap(), None);
    }

    #[test]
    fn test_read_without_counter_key() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("stats.json"),
            r#"{"success":[{"start":"2024-05-01T08:00:00Z","end":"2024-05-01T08:00:02Z","time":2}]}"#,
        )
        .unwrap();

        let file = read(dir.path()).unwrap().unwrap();
        assert_eq!(file.history[Status::SUCCESS].len(), 1);
        assert!(file.counter.is_empty());
    }

    #[test]
    fn test_read_rejects_garbage() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("stats.json"), "{\"success\": [").unwrap();

        assert!(matches!(read(dir.path()), Err(StatsError::Parse { .. })));
    }

    #[test]
    fn test_read_rejects_wrong_shape() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("stats.json"), r#"{"success": 3}"#).unwrap();

        assert!(matches!(read(dir.path()), Err(StatsError::Parse { .. })));
    }
}
