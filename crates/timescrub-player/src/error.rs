//! Error types for playback operations.

use thiserror::Error;
use timescrub_cache::CacheError;

#[derive(Error, Debug)]
pub enum PlayerError {
    /// A caller-supplied hook failed. Never retried.
    #[error("hook failed: {0:#}")]
    Hook(anyhow::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("invalid player config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
