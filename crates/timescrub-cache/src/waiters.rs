//! Registry of fetches waiting for their blocks to load.
//!
//! Each provider owns its own registry, so independent caches never share
//! waiters. A pending fetch is keyed by the exact block set it asked for and
//! resolves only when the live bitmap shows every one of those blocks loaded;
//! the answer is recomputed on every evaluation rather than cached, so the
//! order in which blocks arrive doesn't matter.

use std::collections::HashMap;
use std::ops::RangeInclusive;

use tokio::sync::oneshot;
use tracing::trace;

use crate::blocks::{BlockIndex, LoadedBlocks};

/// A fetch awaiting block-loaded confirmation.
#[derive(Debug)]
pub struct PendingFetch {
    subject: String,
    blocks: RangeInclusive<BlockIndex>,
    completion: oneshot::Sender<()>,
}

impl PendingFetch {
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn blocks(&self) -> &RangeInclusive<BlockIndex> {
        &self.blocks
    }

    fn is_ready(&self, loaded: &LoadedBlocks) -> bool {
        loaded.all_loaded(&self.subject, self.blocks.clone())
    }
}

/// Subject → pending fetches.
#[derive(Debug, Default)]
pub struct WaiterRegistry {
    pending: HashMap<String, Vec<PendingFetch>>,
}

impl WaiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `blocks` of `subject`.
    ///
    /// The receiver completes once every block in the set is loaded. Dropping
    /// the receiver is fine; the entry still resolves (and is removed) through
    /// the same mechanism.
    pub fn register(
        &mut self,
        subject: &str,
        blocks: RangeInclusive<BlockIndex>,
    ) -> oneshot::Receiver<()> {
        let (completion, rx) = oneshot::channel();
        self.pending
            .entry(subject.to_string())
            .or_default()
            .push(PendingFetch { subject: subject.to_string(), blocks, completion });
        rx
    }

    /// Resolve every waiter whose block set is now fully loaded.
    ///
    /// Returns how many were resolved. Unresolved waiters stay registered.
    pub fn resolve_ready(&mut self, loaded: &LoadedBlocks) -> usize {
        let mut resolved = 0;
        for waiters in self.pending.values_mut() {
            let (ready, waiting): (Vec<_>, Vec<_>) =
                waiters.drain(..).partition(|w| w.is_ready(loaded));
            *waiters = waiting;
            for waiter in ready {
                trace!(subject = %waiter.subject, blocks = ?waiter.blocks, "fetch resolved");
                // Receiver may be gone (read-ahead, or caller dropped the future)
                let _ = waiter.completion.send(());
                resolved += 1;
            }
        }
        self.pending.retain(|_, waiters| !waiters.is_empty());
        resolved
    }

    /// Drop waiters for `subject` whose receiver is gone. Returns how many.
    pub fn discard_abandoned(&mut self, subject: &str) -> usize {
        let Some(waiters) = self.pending.get_mut(subject) else {
            return 0;
        };
        let before = waiters.len();
        waiters.retain(|w| !w.completion.is_closed());
        let discarded = before - waiters.len();
        if waiters.is_empty() {
            self.pending.remove(subject);
        }
        discarded
    }

    /// Total pending waiters across all subjects.
    pub fn len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending waiters for one subject.
    pub fn pending_for(&self, subject: &str) -> &[PendingFetch] {
        self.pending.get(subject).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_only_when_whole_set_loaded() {
        let mut registry = WaiterRegistry::new();
        let mut loaded = LoadedBlocks::new();
        let mut rx = registry.register("a", 0..=2);

        loaded.mark("a", 0);
        loaded.mark("a", 2);
        assert_eq!(registry.resolve_ready(&loaded), 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(registry.len(), 1);

        loaded.mark("a", 1);
        assert_eq!(registry.resolve_ready(&loaded), 1);
        assert!(rx.try_recv().is_ok());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_interleaved_resolution_order() {
        let mut registry = WaiterRegistry::new();
        let mut loaded = LoadedBlocks::new();
        let mut wide = registry.register("a", 0..=1);
        let mut narrow = registry.register("a", 1..=1);
        let mut other = registry.register("b", 1..=1);

        loaded.mark("a", 1);
        assert_eq!(registry.resolve_ready(&loaded), 1);
        assert!(narrow.try_recv().is_ok());
        assert!(wide.try_recv().is_err());
        assert!(other.try_recv().is_err());

        loaded.mark("a", 0);
        assert_eq!(registry.resolve_ready(&loaded), 1);
        assert!(wide.try_recv().is_ok());
        assert_eq!(registry.pending_for("b").len(), 1);
        assert!(registry.pending_for("a").is_empty());
    }

    #[test]
    fn test_discard_abandoned_keeps_live_receivers() {
        let mut registry = WaiterRegistry::new();
        let live = registry.register("a", 0..=0);
        drop(registry.register("a", 1..=1));
        drop(registry.register("b", 1..=1));

        assert_eq!(registry.discard_abandoned("a"), 1);
        assert_eq!(registry.pending_for("a").len(), 1);
        assert_eq!(registry.pending_for("b").len(), 1);

        drop(live);
        assert_eq!(registry.discard_abandoned("a"), 1);
        assert_eq!(registry.discard_abandoned("a"), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_dropped_receiver_still_resolves() {
        let mut registry = WaiterRegistry::new();
        let mut loaded = LoadedBlocks::new();
        drop(registry.register("a", 4..=4));
        loaded.mark("a", 4);
        assert_eq!(registry.resolve_ready(&loaded), 1);
        assert!(registry.is_empty());
    }
}
