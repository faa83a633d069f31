//! Shared record and request types for timescrub.
//!
//! This crate is the wire-facing foundation: what a record looks like once it
//! has been decoded, how an inbound batch is shaped, and how the cache asks a
//! caller-supplied factory for requests covering arbitrary sub-ranges. It has
//! **no internal timescrub dependencies**.
//!
//! # Key Types
//!
//! |---------------------|--------------------------------------------------|
//! | Type                | Purpose                                          |
//! |---------------------|--------------------------------------------------|
//! | [`Record`]          | One payload observed on a subject at a timestamp |
//! | [`Batch`]           | Inbound response: subject, range, items          |
//! | [`Request`]         | Outbound message handed to the transport         |
//! | [`RequestSpec`]     | Factory producing requests for a subject         |
//! | [`TimeRange`]       | Inclusive `[start, end]` interval                |
//! |---------------------|--------------------------------------------------|

pub mod batch;
pub mod error;
pub mod range;
pub mod request;

pub use batch::{Batch, Record};
pub use error::ProtocolViolation;
pub use range::{TimeRange, Timestamp};
pub use request::{Request, RequestSpec, SubjectRequest};
