//! Time axis primitives.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A point on the monotonic time axis (milliseconds by convention).
pub type Timestamp = i64;

/// An inclusive `[start, end]` interval on the time axis.
///
/// A range with `start > end` is empty and contains nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(alias = "start_time", rename = "startTime")]
    pub start: Timestamp,
    #[serde(alias = "end_time", rename = "endTime")]
    pub end: Timestamp,
}

impl TimeRange {
    pub const fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// A range covering exactly one timestamp.
    pub const fn at(timestamp: Timestamp) -> Self {
        Self { start: timestamp, end: timestamp }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, timestamp: Timestamp) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }

    /// Number of timestamps covered (0 when empty, saturating for the whole axis).
    pub fn span(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.end.abs_diff(self.start).saturating_add(1)
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}
