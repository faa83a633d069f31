//! Decoding errors for inbound messages.

use thiserror::Error;

/// An inbound message did not have the shape of a [`Batch`](crate::Batch).
///
/// The transport handed us something outside the expected schema. This is
/// never retried: the owner of the subscription decides what to do with it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("protocol violation: {0}")]
pub struct ProtocolViolation(pub String);

impl ProtocolViolation {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
