//! Error types for cache and provider operations.

use thiserror::Error;
use timescrub_types::ProtocolViolation;

/// Errors surfaced by providers and the inbound pump.
///
/// An empty result is never an error: once every covering block is loaded,
/// `[]` is the authoritative answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// An inbound message didn't have the batch shape.
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),

    /// The transport's outbound channel is gone.
    #[error("transport closed")]
    TransportClosed,

    /// A pending fetch's completion was dropped before its blocks loaded.
    #[error("fetch for {subject} abandoned before completion")]
    FetchAbandoned { subject: String },

    /// Rejected configuration value.
    #[error("invalid cache config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
