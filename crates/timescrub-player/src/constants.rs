//! Player defaults.

/// Playback step, in timestamp units (milliseconds), and the minimum
/// wall-clock time between committed frames.
pub const DEFAULT_INTERVAL_MS: i64 = 33;

/// How often the frame ticker wakes to check whether a frame is due.
pub const DEFAULT_FRAME_PERIOD_MS: u64 = 16;
