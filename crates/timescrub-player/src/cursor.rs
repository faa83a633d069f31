//! Playback cursor: the current position on the time axis.

use timescrub_types::Timestamp;

/// A position that never goes below zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackCursor {
    timestamp: Timestamp,
}

impl PlaybackCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cursor already positioned at `t` (clamped).
    pub fn at(t: Timestamp) -> Self {
        let mut cursor = Self::new();
        cursor.seek(t);
        cursor
    }

    pub fn current_time(&self) -> Timestamp {
        self.timestamp
    }

    /// Move to `t`, clamped to zero. Returns the new position.
    pub fn seek(&mut self, t: Timestamp) -> Timestamp {
        self.timestamp = t.max(0);
        self.timestamp
    }

    pub fn advance(&mut self, step: Timestamp) -> Timestamp {
        self.seek(self.timestamp.saturating_add(step))
    }

    /// Step back, stopping at zero.
    pub fn retreat(&mut self, step: Timestamp) -> Timestamp {
        self.seek(self.timestamp.saturating_sub(step))
    }

    pub fn reset(&mut self) {
        self.timestamp = 0;
    }
}
