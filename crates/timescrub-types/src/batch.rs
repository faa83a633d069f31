//! Decoded records and the inbound batch envelope.
//!
//! The transport delivers batches shaped like
//!
//! ```text
//! { "subject": "status/position",
//!   "startTime": 0, "endTime": 99,
//!   "items": [ { "timestamp": 10, ...payload }, ... ] }
//! ```
//!
//! Snake-case keys (`start_time`, `end_time`) are accepted as aliases. The
//! declared subject of the batch is authoritative for every item in it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolViolation;
use crate::range::{TimeRange, Timestamp};

/// One payload observed on a subject at a timestamp.
///
/// The payload is opaque to the engine; it is kept as the JSON object the
/// codec produced, minus the `timestamp` key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub subject: String,
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Record {
    pub fn new(subject: impl Into<String>, timestamp: Timestamp, payload: Map<String, Value>) -> Self {
        Self { subject: subject.into(), timestamp, payload }
    }

    /// A record with an empty payload.
    pub fn bare(subject: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::new(subject, timestamp, Map::new())
    }

    /// Look up a payload field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

/// Wire form of a batch item: `timestamp` plus any payload fields.
#[derive(Deserialize, Serialize)]
struct WireItem {
    timestamp: Timestamp,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

#[derive(Deserialize, Serialize)]
struct WireBatch {
    subject: String,
    #[serde(rename = "startTime", alias = "start_time")]
    start_time: Timestamp,
    #[serde(rename = "endTime", alias = "end_time")]
    end_time: Timestamp,
    items: Vec<WireItem>,
}

/// A decoded inbound response.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub subject: String,
    /// The range the sender declares this batch to cover. Items need not fill it.
    pub range: TimeRange,
    pub items: Vec<Arc<Record>>,
}

impl Batch {
    pub fn new(subject: impl Into<String>, range: TimeRange, items: Vec<Arc<Record>>) -> Self {
        Self { subject: subject.into(), range, items }
    }

    /// Decode a raw message, failing fast on anything that isn't a batch.
    pub fn decode(value: Value) -> Result<Self, ProtocolViolation> {
        let wire: WireBatch = serde_json::from_value(value)
            .map_err(|e| ProtocolViolation::new(format!("malformed batch: {e}")))?;

        if wire.end_time < wire.start_time {
            return Err(ProtocolViolation::new(format!(
                "batch for {} has endTime {} before startTime {}",
                wire.subject, wire.end_time, wire.start_time
            )));
        }

        let subject = wire.subject;
        let items = wire
            .items
            .into_iter()
            .map(|item| Arc::new(Record::new(subject.clone(), item.timestamp, item.payload)))
            .collect();

        Ok(Self {
            range: TimeRange::new(wire.start_time, wire.end_time),
            subject,
            items,
        })
    }

    /// Encode back into the wire shape (used by simulated transports).
    pub fn encode(&self) -> Value {
        let wire = WireBatch {
            subject: self.subject.clone(),
            start_time: self.range.start,
            end_time: self.range.end,
            items: self
                .items
                .iter()
                .map(|r| WireItem { timestamp: r.timestamp, payload: r.payload.clone() })
                .collect(),
        };
        // WireBatch only holds strings, integers and JSON maps
        serde_json::to_value(wire).unwrap_or(Value::Null)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
