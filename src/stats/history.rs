//! Job outcome records and the per-status history entries built from them.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key under which lifetime counters are stored in `stats.json`.
pub const COUNTER_KEY: &str = "counter";

/// Outcome tag of a job. Open-ended: any value a job reports is a valid bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(String);

impl Status {
    pub const SUCCESS: &'static str = "success";

    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    pub fn success() -> Self {
        Self::new(Self::SUCCESS)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_success(&self) -> bool {
        self.0 == Self::SUCCESS
    }

    /// The counters key shares the top level of `stats.json` with status buckets.
    pub fn is_reserved(&self) -> bool {
        self.0 == COUNTER_KEY
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Status {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for Status {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A completed job as seen by the recorder.
pub trait JobOutcome {
    fn status(&self) -> Status;
    fn start(&self) -> DateTime<Utc>;
    fn end(&self) -> DateTime<Utc>;
    fn elapsed(&self) -> Duration;
}

/// Plain owned job outcome, for callers without their own job type.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub status: Status,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub elapsed: Duration,
}

impl JobRecord {
    /// Build a record whose elapsed time is `end - start` (zero if negative).
    pub fn new(status: impl Into<Status>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let elapsed = (end - start).to_std().unwrap_or_default();
        Self {
            status: status.into(),
            start,
            end,
            elapsed,
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }
}

impl JobOutcome for JobRecord {
    fn status(&self) -> Status {
        self.status.clone()
    }

    fn start(&self) -> DateTime<Utc> {
        self.start
    }

    fn end(&self) -> DateTime<Utc> {
        self.end
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Timing snapshot of one job, as stored in a history bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(rename = "time", with = "secs_f64")]
    pub elapsed: Duration,
}

impl HistoryEntry {
    pub fn from_job<J: JobOutcome + ?Sized>(job: &J) -> Self {
        Self {
            start: job.start(),
            end: job.end(),
            elapsed: job.elapsed(),
        }
    }
}

/// Durations are written as fractional seconds.
mod secs_f64 {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    #[test]
    fn test_job_record_derives_elapsed() {
        let job = JobRecord::new("success", ts(0), ts(42));
        assert_eq!(job.elapsed, Duration::from_secs(42));
        assert!(job.status.is_success());
    }

    #[test]
    fn test_job_record_negative_span_is_zero() {
        let job = JobRecord::new("failure", ts(10), ts(0));
        assert_eq!(job.elapsed, Duration::ZERO);
    }

    #[test]
    fn test_entry_json_shape() {
        let job = JobRecord::new("success", ts(0), ts(2)).with_elapsed(Duration::from_millis(1500));
        let entry = HistoryEntry::from_job(&job);

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["start"], "2024-03-01T12:00:00Z");
        assert_eq!(value["end"], "2024-03-01T12:00:02Z");
        assert_eq!(value["time"], 1.5);
        assert!(value.get("elapsed").is_none());
    }

    #[test]
    fn test_entry_rejects_negative_time() {
        let json = r#"{"start":"2024-03-01T12:00:00Z","end":"2024-03-01T12:00:01Z","time":-1.0}"#;
        assert!(serde_json::from_str::<HistoryEntry>(json).is_err());
    }

    #[test]
    fn test_status_reserved_and_display() {
        assert!(Status::new("counter").is_reserved());
        assert!(!Status::new("timeout").is_reserved());
        assert_eq!(Status::new("no_connection").to_string(), "no_connection");
    }
}
