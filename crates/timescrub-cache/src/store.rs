//! Time bucket store: records indexed by timestamp, then subject.
//!
//! The store is keyed by timestamp, not arrival order, so out-of-order
//! delivery is harmless: a late batch for an earlier block simply fills in
//! earlier buckets.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use timescrub_types::{Record, TimeRange, Timestamp};

/// In-memory mapping `timestamp -> (subject -> record)`.
///
/// At most one record is retained per `(timestamp, subject)`; the last write
/// wins. The `[start_time, end_time]` bounds cover every timestamp ever
/// inserted and only widen until [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct TimeBucketStore {
    buckets: BTreeMap<Timestamp, HashMap<String, Arc<Record>>>,
    /// `None` until the first insert.
    bounds: Option<(Timestamp, Timestamp)>,
    len: usize,
}

impl TimeBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the record for `subject` at `record.timestamp`.
    pub fn insert(&mut self, subject: &str, record: Arc<Record>) {
        let ts = record.timestamp;
        let bucket = self.buckets.entry(ts).or_default();
        if bucket.insert(subject.to_string(), record).is_none() {
            self.len += 1;
        }

        self.bounds = Some(match self.bounds {
            None => (ts, ts),
            Some((start, end)) => (start.min(ts), end.max(ts)),
        });
    }

    /// Records of `subject` with `start <= timestamp <= end`, latest first.
    pub fn range_query(&self, subject: &str, start: Timestamp, end: Timestamp) -> Vec<Arc<Record>> {
        if start > end {
            return Vec::new();
        }
        self.buckets
            .range(start..=end)
            .rev()
            .filter_map(|(_, bucket)| bucket.get(subject).cloned())
            .collect()
    }

    /// [`range_query`](Self::range_query) over a [`TimeRange`].
    pub fn query(&self, subject: &str, range: TimeRange) -> Vec<Arc<Record>> {
        self.range_query(subject, range.start, range.end)
    }

    /// The record for `subject` at exactly `timestamp`.
    pub fn get(&self, subject: &str, timestamp: Timestamp) -> Option<Arc<Record>> {
        self.buckets.get(&timestamp)?.get(subject).cloned()
    }

    /// Earliest timestamp ever inserted, 0 while empty.
    pub fn start_time(&self) -> Timestamp {
        self.bounds.map(|(start, _)| start).unwrap_or(0)
    }

    /// Latest timestamp ever inserted, 0 while empty.
    pub fn end_time(&self) -> Timestamp {
        self.bounds.map(|(_, end)| end).unwrap_or(0)
    }

    /// Number of retained `(timestamp, subject)` records.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Distinct subjects present, sorted.
    pub fn subjects(&self) -> Vec<String> {
        let mut subjects: Vec<String> = self
            .buckets
            .values()
            .flat_map(|bucket| bucket.keys().cloned())
            .collect();
        subjects.sort();
        subjects.dedup();
        subjects
    }

    /// Drop everything and reset the bounds to zero.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.bounds = None;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn rec(subject: &str, ts: Timestamp) -> Arc<Record> {
        Arc::new(Record::bare(subject, ts))
    }

    fn rec_with(subject: &str, ts: Timestamp, value: i64) -> Arc<Record> {
        let mut payload = Map::new();
        payload.insert("v".into(), json!(value));
        Arc::new(Record::new(subject, ts, payload))
    }

    fn timestamps(records: &[Arc<Record>]) -> Vec<Timestamp> {
        records.iter().map(|r| r.timestamp).collect()
    }

    #[test]
    fn test_empty_store() {
        let store = TimeBucketStore::new();
        assert!(store.is_empty());
        assert_eq!(store.start_time(), 0);
        assert_eq!(store.end_time(), 0);
        assert!(store.range_query("a", 0, 1000).is_empty());
    }

    #[test]
    fn test_range_query_descending() {
        let mut store = TimeBucketStore::new();
        for ts in [10, 40, 25, 99, 100] {
            store.insert("a", rec("a", ts));
        }
        store.insert("b", rec("b", 30));

        let got = store.range_query("a", 0, 99);
        assert_eq!(timestamps(&got), vec![99, 40, 25, 10]);
        assert_eq!(timestamps(&store.range_query("b", 0, 99)), vec![30]);
        assert!(store.range_query("a", 50, 60).is_empty());
        assert!(store.range_query("a", 99, 10).is_empty());
    }

    #[test]
    fn test_bounds_widen_regardless_of_order() {
        let mut store = TimeBucketStore::new();
        let mut last = (i64::MAX, i64::MIN);
        for ts in [500, 200, 900, 300, 100, 950] {
            store.insert("a", rec("a", ts));
            let (start, end) = (store.start_time(), store.end_time());
            assert!(start <= end);
            if last.0 != i64::MAX {
                assert!(start <= last.0, "start shrank");
                assert!(end >= last.1, "end shrank");
            }
            last = (start, end);
        }
        assert_eq!((store.start_time(), store.end_time()), (100, 950));
    }

    #[test]
    fn test_last_write_wins_and_idempotent_insert() {
        let mut store = TimeBucketStore::new();
        store.insert("a", rec_with("a", 10, 1));
        store.insert("a", rec_with("a", 10, 1));
        assert_eq!(store.len(), 1);
        assert_eq!(store.range_query("a", 0, 20).len(), 1);

        store.insert("a", rec_with("a", 10, 2));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a", 10).unwrap().get("v"), Some(&json!(2)));
    }

    #[test]
    fn test_subjects_share_buckets() {
        let mut store = TimeBucketStore::new();
        store.insert("b", rec("b", 10));
        store.insert("a", rec("a", 10));
        assert_eq!(store.len(), 2);
        assert_eq!(store.subjects(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_clear_resets_bounds() {
        let mut store = TimeBucketStore::new();
        store.insert("a", rec("a", 42));
        store.insert("a", rec("a", 84));
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.start_time(), 0);
        assert_eq!(store.end_time(), 0);

        store.insert("a", rec("a", 500));
        assert_eq!((store.start_time(), store.end_time()), (500, 500));
    }
}
