//! Cache defaults.

/// Width of one block on the time axis.
pub const DEFAULT_BLOCK_MS: i64 = 100;

/// How many blocks past the served range a read-ahead covers.
pub const DEFAULT_READ_AHEAD_BLOCKS: i64 = 2;
