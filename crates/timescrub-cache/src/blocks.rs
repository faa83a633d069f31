//! Block partitioning of the time axis and per-subject block bookkeeping.
//!
//! A block is the fixed-width unit of fetch deduplication: block `i` covers
//! `[i * block_ms, (i + 1) * block_ms - 1]`. A block is *loaded* for a subject
//! once a batch arrives whose declared range is block-aligned and covers it.

use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;

use timescrub_types::{TimeRange, Timestamp};

/// Index of a block on the time axis.
pub type BlockIndex = i64;

/// Fixed-width partitioning of the time axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockLayout {
    block_ms: i64,
}

impl BlockLayout {
    /// `block_ms` must be positive; callers validate it through `CacheConfig`.
    pub fn new(block_ms: i64) -> Self {
        debug_assert!(block_ms > 0, "block_ms must be positive");
        Self { block_ms }
    }

    pub fn block_ms(&self) -> i64 {
        self.block_ms
    }

    /// `floor(ts / block_ms)`, flooring toward negative infinity.
    pub fn index_of(&self, ts: Timestamp) -> BlockIndex {
        ts.div_euclid(self.block_ms)
    }

    /// The inclusive time range block `index` covers, saturating at the ends
    /// of the time axis.
    pub fn bounds(&self, index: BlockIndex) -> TimeRange {
        let start = index.saturating_mul(self.block_ms);
        TimeRange::new(start, start.saturating_add(self.block_ms - 1))
    }

    /// Blocks overlapping `range`, or an empty span when the range is empty.
    #[allow(clippy::reversed_empty_ranges)]
    pub fn covering(&self, range: TimeRange) -> RangeInclusive<BlockIndex> {
        if range.is_empty() {
            return 1..=0;
        }
        self.index_of(range.start)..=self.index_of(range.end)
    }

    /// Blocks a batch range exactly covers, if it is block-aligned.
    ///
    /// Aligned means `start % block_ms == 0` and `(end + 1) % block_ms == 0`.
    /// A range ending at `Timestamp::MAX` is never aligned.
    pub fn aligned(&self, range: TimeRange) -> Option<RangeInclusive<BlockIndex>> {
        if range.is_empty() || range.start.rem_euclid(self.block_ms) != 0 {
            return None;
        }
        let after = range.end.checked_add(1)?;
        if after.rem_euclid(self.block_ms) != 0 {
            return None;
        }
        Some(self.index_of(range.start)..=self.index_of(range.end))
    }
}

/// Per-subject set of loaded blocks.
///
/// Marking is monotonic: nothing un-marks a block except [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct LoadedBlocks {
    by_subject: HashMap<String, HashSet<BlockIndex>>,
}

impl LoadedBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a block loaded. Returns true if it wasn't already.
    pub fn mark(&mut self, subject: &str, block: BlockIndex) -> bool {
        match self.by_subject.get_mut(subject) {
            Some(set) => set.insert(block),
            None => {
                self.by_subject.insert(subject.to_string(), HashSet::from([block]));
                true
            }
        }
    }

    pub fn is_loaded(&self, subject: &str, block: BlockIndex) -> bool {
        self.by_subject
            .get(subject)
            .is_some_and(|set| set.contains(&block))
    }

    /// True when every block in `blocks` is loaded (vacuously true when empty).
    pub fn all_loaded<I>(&self, subject: &str, blocks: I) -> bool
    where
        I: IntoIterator<Item = BlockIndex>,
    {
        let Some(set) = self.by_subject.get(subject) else {
            return blocks.into_iter().next().is_none();
        };
        blocks.into_iter().all(|b| set.contains(&b))
    }

    /// Number of loaded blocks for `subject`.
    pub fn count(&self, subject: &str) -> usize {
        self.by_subject.get(subject).map_or(0, HashSet::len)
    }

    pub fn clear(&mut self) {
        self.by_subject.clear();
    }
}
