//! Outbound requests and the factory the cache uses to build them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::range::{TimeRange, Timestamp};

/// An outbound request for one subject over an inclusive time range.
///
/// `params` carries whatever the payload schema needs (resource names, image
/// scale, ...). The engine never looks inside it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub subject: String,
    #[serde(rename = "startTime", alias = "start_time")]
    pub start_time: Timestamp,
    #[serde(rename = "endTime", alias = "end_time")]
    pub end_time: Timestamp,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl Request {
    pub fn new(subject: impl Into<String>, range: TimeRange) -> Self {
        Self {
            subject: subject.into(),
            start_time: range.start,
            end_time: range.end,
            params: Value::Null,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }
}

/// Builds requests for one subject over arbitrary sub-ranges.
///
/// Supplied by the caller so the cache can re-issue requests per block
/// without knowing the payload schema.
pub trait RequestSpec {
    fn subject(&self) -> &str;

    fn create_request(&self, start_time: Timestamp, end_time: Timestamp) -> Request;
}

/// A [`RequestSpec`] that stamps the same `params` on every request.
#[derive(Clone, Debug, PartialEq)]
pub struct SubjectRequest {
    subject: String,
    params: Value,
}

impl SubjectRequest {
    pub fn new(subject: impl Into<String>) -> Self {
        Self { subject: subject.into(), params: Value::Null }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

impl RequestSpec for SubjectRequest {
    fn subject(&self) -> &str {
        &self.subject
    }

    fn create_request(&self, start_time: Timestamp, end_time: Timestamp) -> Request {
        Request::new(self.subject.clone(), TimeRange::new(start_time, end_time))
            .with_params(self.params.clone())
    }
}
