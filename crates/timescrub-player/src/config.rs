//! Player configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_FRAME_PERIOD_MS, DEFAULT_INTERVAL_MS};
use crate::error::{PlayerError, Result};

/// Tunables for [`Player`](crate::Player).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Step between frames, both on the timestamp axis and in wall-clock ms.
    pub interval_ms: i64,
    /// Ticker period. `None` leaves frame driving to the host, which calls
    /// [`Player::frame`](crate::Player::frame) from its own loop.
    pub frame_period_ms: Option<u64>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            frame_period_ms: Some(DEFAULT_FRAME_PERIOD_MS),
        }
    }
}

impl PlayerConfig {
    pub fn with_interval_ms(mut self, interval_ms: i64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    pub fn with_frame_period_ms(mut self, period: Option<u64>) -> Self {
        self.frame_period_ms = period;
        self
    }

    /// Host-driven frames: no ticker is spawned on `play`.
    pub fn manual_frames(self) -> Self {
        self.with_frame_period_ms(None)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.unsigned_abs())
    }

    pub fn frame_period(&self) -> Option<Duration> {
        self.frame_period_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_ms <= 0 {
            return Err(PlayerError::InvalidConfig(format!(
                "interval_ms must be positive, got {}",
                self.interval_ms
            )));
        }
        if self.frame_period_ms == Some(0) {
            return Err(PlayerError::InvalidConfig(
                "frame_period_ms must be positive when set".into(),
            ));
        }
        Ok(())
    }
}
