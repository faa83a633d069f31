//! Cache configuration.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BLOCK_MS, DEFAULT_READ_AHEAD_BLOCKS};
use crate::error::{CacheError, Result};

/// Tunables for [`BlockCacheProvider`](crate::BlockCacheProvider).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Width of one block on the time axis.
    pub block_ms: i64,
    /// Blocks past the served range to prefetch. 0 disables read-ahead.
    pub read_ahead_blocks: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            block_ms: DEFAULT_BLOCK_MS,
            read_ahead_blocks: DEFAULT_READ_AHEAD_BLOCKS,
        }
    }
}

impl CacheConfig {
    pub fn with_block_ms(mut self, block_ms: i64) -> Self {
        self.block_ms = block_ms;
        self
    }

    pub fn with_read_ahead_blocks(mut self, blocks: i64) -> Self {
        self.read_ahead_blocks = blocks;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_ms <= 0 {
            return Err(CacheError::InvalidConfig(format!(
                "block_ms must be positive, got {}",
                self.block_ms
            )));
        }
        if self.read_ahead_blocks < 0 {
            return Err(CacheError::InvalidConfig(format!(
                "read_ahead_blocks cannot be negative, got {}",
                self.read_ahead_blocks
            )));
        }
        Ok(())
    }
}
