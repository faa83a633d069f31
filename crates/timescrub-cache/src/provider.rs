//! The data-source contract the playback loader reads through.

use std::rc::Rc;
use std::sync::Arc;

use async_trait::async_trait;

use timescrub_types::{Record, RequestSpec, TimeRange, Timestamp};

use crate::error::Result;

/// A source of records for one or more subjects over time ranges.
///
/// Results are ordered latest → earliest. An empty result is a valid answer,
/// not an error.
#[async_trait(?Send)]
pub trait DataProvider {
    async fn get(&self, spec: &dyn RequestSpec, range: TimeRange) -> Result<Vec<Arc<Record>>>;

    /// Earliest timestamp the provider knows about.
    fn start_time(&self) -> Timestamp;

    /// Latest timestamp the provider knows about.
    fn end_time(&self) -> Timestamp;

    /// Drop cached data so it is fetched again.
    fn clear(&self);
}

#[async_trait(?Send)]
impl<P: DataProvider + ?Sized> DataProvider for Rc<P> {
    async fn get(&self, spec: &dyn RequestSpec, range: TimeRange) -> Result<Vec<Arc<Record>>> {
        (**self).get(spec, range).await
    }

    fn start_time(&self) -> Timestamp {
        (**self).start_time()
    }

    fn end_time(&self) -> Timestamp {
        (**self).end_time()
    }

    fn clear(&self) {
        (**self).clear()
    }
}
