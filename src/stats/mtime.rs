//! Fixed-length ring of recent "touch" timestamps.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

/// One slot of the ring. Slots never written read as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mtime {
    Unknown,
    At(DateTime<Utc>),
}

impl Mtime {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Mtime::Unknown => None,
            Mtime::At(ts) => Some(*ts),
        }
    }
}

impl fmt::Display for Mtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mtime::Unknown => f.write_str("unknown"),
            Mtime::At(ts) => f.write_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

impl Serialize for Mtime {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

#[derive(Debug, Clone)]
pub struct MtimeRing {
    slots: VecDeque<Mtime>,
}

impl MtimeRing {
    /// A ring of `len` unknown slots. `len` must be at least 1.
    pub fn new(len: usize) -> Self {
        Self {
            slots: VecDeque::from(vec![Mtime::Unknown; len]),
        }
    }

    /// Push `ts` at the tail and drop the head; the length never changes.
    pub fn push(&mut self, ts: DateTime<Utc>) {
        self.slots.push_back(Mtime::At(ts));
        self.slots.pop_front();
    }

    pub fn latest(&self) -> Mtime {
        self.slots.back().copied().unwrap_or(Mtime::Unknown)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Mtime> {
        self.slots.iter()
    }
}
