//! Loader: the narrow contract the player drives, and its provider adapter.

use std::cell::Cell;
use std::sync::Arc;

use async_trait::async_trait;

use timescrub_cache::{CacheError, DataProvider};
use timescrub_types::{Record, RequestSpec, TimeRange, Timestamp};

use crate::cursor::PlaybackCursor;

/// Position plus data access, as seen by the player and its hooks.
#[async_trait(?Send)]
pub trait Loader {
    fn seek(&self, t: Timestamp);

    fn current_time(&self) -> Timestamp;

    fn start_time(&self) -> Timestamp;

    fn end_time(&self) -> Timestamp;

    /// Records of `spec.subject()` in `[start, end]`, latest first.
    async fn get_message(
        &self,
        spec: &dyn RequestSpec,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Arc<Record>>, CacheError>;

    fn reset(&self);
}

/// Adapts a [`DataProvider`] plus a [`PlaybackCursor`] into a [`Loader`].
pub struct PlaybackDataLoader<P> {
    provider: P,
    cursor: Cell<PlaybackCursor>,
    start_override: Option<Timestamp>,
}

impl<P: DataProvider> PlaybackDataLoader<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            cursor: Cell::new(PlaybackCursor::new()),
            start_override: None,
        }
    }

    /// Report `start` as the start time instead of the provider's bound.
    pub fn with_start_time(mut self, start: Timestamp) -> Self {
        self.start_override = Some(start);
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

#[async_trait(?Send)]
impl<P: DataProvider> Loader for PlaybackDataLoader<P> {
    fn seek(&self, t: Timestamp) {
        let mut cursor = self.cursor.get();
        cursor.seek(t);
        self.cursor.set(cursor);
    }

    fn current_time(&self) -> Timestamp {
        self.cursor.get().current_time()
    }

    fn start_time(&self) -> Timestamp {
        self.start_override.unwrap_or_else(|| self.provider.start_time())
    }

    fn end_time(&self) -> Timestamp {
        self.provider.end_time()
    }

    async fn get_message(
        &self,
        spec: &dyn RequestSpec,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<Arc<Record>>, CacheError> {
        self.provider.get(spec, TimeRange::new(start, end)).await
    }

    /// Clear the provider and rewind to the start time.
    fn reset(&self) {
        self.provider.clear();
        self.seek(self.start_time());
    }
}

impl<P> std::fmt::Debug for PlaybackDataLoader<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackDataLoader")
            .field("cursor", &self.cursor.get())
            .field("start_override", &self.start_override)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::cell::RefCell;
    use timescrub_types::SubjectRequest;

    /// Provider with fixed bounds that records what it was asked for.
    #[derive(Default)]
    struct FixedProvider {
        bounds: Cell<(Timestamp, Timestamp)>,
        asked: RefCell<Vec<(String, TimeRange)>>,
        clears: Cell<usize>,
    }

    #[async_trait(?Send)]
    impl DataProvider for FixedProvider {
        async fn get(
            &self,
            spec: &dyn RequestSpec,
            range: TimeRange,
        ) -> Result<Vec<Arc<Record>>, CacheError> {
            self.asked.borrow_mut().push((spec.subject().to_string(), range));
            Ok(vec![Arc::new(Record::bare(spec.subject(), range.end))])
        }

        fn start_time(&self) -> Timestamp {
            self.bounds.get().0
        }

        fn end_time(&self) -> Timestamp {
            self.bounds.get().1
        }

        fn clear(&self) {
            self.clears.set(self.clears.get() + 1);
            self.bounds.set((0, 0));
        }
    }

    fn provider(start: Timestamp, end: Timestamp) -> FixedProvider {
        let provider = FixedProvider::default();
        provider.bounds.set((start, end));
        provider
    }

    #[test]
    fn test_bounds_follow_provider_unless_overridden() {
        let loader = PlaybackDataLoader::new(provider(200, 900));
        assert_eq!((loader.start_time(), loader.end_time()), (200, 900));

        let loader = PlaybackDataLoader::new(provider(200, 900)).with_start_time(50);
        assert_eq!((loader.start_time(), loader.end_time()), (50, 900));
    }

    #[test]
    fn test_seek_clamps() {
        let loader = PlaybackDataLoader::new(provider(0, 100));
        loader.seek(40);
        assert_eq!(loader.current_time(), 40);
        loader.seek(-3);
        assert_eq!(loader.current_time(), 0);
    }

    #[test]
    fn test_get_message_passes_range_through() {
        let loader = PlaybackDataLoader::new(provider(0, 100));
        let got = loader
            .get_message(&SubjectRequest::new("pos"), 10, 43)
            .now_or_never()
            .unwrap()
            .unwrap();
        assert_eq!(got[0].timestamp, 43);
        assert_eq!(
            *loader.provider().asked.borrow(),
            vec![("pos".to_string(), TimeRange::new(10, 43))]
        );
    }

    #[test]
    fn test_reset_clears_provider_and_rewinds() {
        let loader = PlaybackDataLoader::new(provider(300, 900)).with_start_time(120);
        loader.seek(700);
        loader.reset();
        assert_eq!(loader.provider().clears.get(), 1);
        assert_eq!(loader.current_time(), 120);

        // Without an override, rewinds to the (now cleared) provider bound
        let loader = PlaybackDataLoader::new(provider(300, 900));
        loader.seek(700);
        loader.reset();
        assert_eq!(loader.current_time(), 0);
    }
}
