//! Block-deduplicating historical cache.
//!
//! `get(spec, range)` serves from the store when it can and otherwise fetches
//! the missing fixed-width blocks covering the range, one request per block,
//! never re-requesting a block that is loaded or already in flight:
//!
//! ```text
//!   get ──▶ store hit? ──yes──▶ return + read-ahead
//!             │ no
//!             ▼
//!        all blocks loaded? ──yes──▶ return []   (authoritative, nothing sent)
//!             │ no
//!             ▼
//!        register waiter(blocks) ─▶ send missing blocks ─▶ await waiter
//!                                                         │
//!   on_batch ─▶ insert ─▶ mark aligned blocks ─▶ resolve waiters ─▶ notify
//! ```
//!
//! Everything runs on one thread. State lives in a `RefCell` that is never
//! borrowed across an `.await`, a transport send, or a listener call, so a
//! transport that replies synchronously from inside `send` is fine.

use std::cell::{Ref, RefCell};
use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;
use std::rc::Rc;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use timescrub_types::{Batch, Record, RequestSpec, TimeRange, Timestamp};

use crate::blocks::{BlockIndex, BlockLayout, LoadedBlocks};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::observers::{Listener, ListenerId, ObserverRegistry};
use crate::provider::DataProvider;
use crate::store::TimeBucketStore;
use crate::transport::{BatchSink, Transport};
use crate::waiters::WaiterRegistry;

#[derive(Debug, Default)]
struct CacheState {
    store: TimeBucketStore,
    loaded: LoadedBlocks,
    in_flight: HashMap<String, HashSet<BlockIndex>>,
    waiters: WaiterRegistry,
}

struct Inner {
    config: CacheConfig,
    layout: BlockLayout,
    transport: Rc<dyn Transport>,
    state: RefCell<CacheState>,
    observers: ObserverRegistry,
}

/// Historical data provider backed by a [`TimeBucketStore`].
///
/// Cheap to clone; clones share one cache.
#[derive(Clone)]
pub struct BlockCacheProvider {
    inner: Rc<Inner>,
}

impl BlockCacheProvider {
    /// A cache with default configuration.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::build(Rc::new(transport), CacheConfig::default())
    }

    pub fn with_config(transport: impl Transport + 'static, config: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(Rc::new(transport), config))
    }

    fn build(transport: Rc<dyn Transport>, config: CacheConfig) -> Self {
        Self {
            inner: Rc::new(Inner {
                layout: BlockLayout::new(config.block_ms),
                config,
                transport,
                state: RefCell::new(CacheState::default()),
                observers: ObserverRegistry::new(),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn layout(&self) -> BlockLayout {
        self.inner.layout
    }

    /// Records of `spec.subject()` within `range`, latest first.
    ///
    /// Suspends only while blocks covering the range are being fetched.
    pub async fn get(&self, spec: &dyn RequestSpec, range: TimeRange) -> Result<Vec<Arc<Record>>> {
        let subject = spec.subject();

        let cached = self.inner.state.borrow().store.query(subject, range);
        if !cached.is_empty() {
            self.read_ahead(spec, range.end);
            return Ok(cached);
        }

        let blocks = self.inner.layout.covering(range);
        let completion = {
            let mut state = self.inner.state.borrow_mut();
            if state.loaded.all_loaded(subject, blocks.clone()) {
                trace!(subject = %subject, %range, "blocks loaded, no data in range");
                return Ok(Vec::new());
            }
            state.waiters.register(subject, blocks.clone())
        };

        if let Err(e) = self.request_blocks(spec, blocks) {
            drop(completion);
            self.inner.state.borrow_mut().waiters.discard_abandoned(subject);
            return Err(e);
        }
        completion.await.map_err(|_| CacheError::FetchAbandoned {
            subject: subject.to_string(),
        })?;

        let records = self.inner.state.borrow().store.query(subject, range);
        self.read_ahead(spec, range.end);
        Ok(records)
    }

    /// Prefetch the blocks just past `end` without waiting for them.
    ///
    /// A waiter is registered only when something was actually sent, so
    /// repeated hits on an in-flight window don't pile up.
    fn read_ahead(&self, spec: &dyn RequestSpec, end: Timestamp) {
        let blocks_ahead = self.inner.config.read_ahead_blocks;
        if blocks_ahead == 0 {
            return;
        }
        let subject = spec.subject();
        let Some(ahead) = blocks_ahead
            .checked_mul(self.inner.layout.block_ms())
            .and_then(|span| Some(TimeRange::new(end.checked_add(1)?, end.checked_add(span)?)))
        else {
            trace!(subject = %subject, end, "read-ahead past end of time axis skipped");
            return;
        };
        let blocks = self.inner.layout.covering(ahead);
        if self.inner.state.borrow().loaded.all_loaded(subject, blocks.clone()) {
            return;
        }

        match self.request_blocks(spec, blocks.clone()) {
            Ok(0) => {}
            Ok(_) => {
                let mut guard = self.inner.state.borrow_mut();
                let state = &mut *guard;
                // Nobody listens; a synchronous reply may already have loaded it
                drop(state.waiters.register(subject, blocks));
                state.waiters.resolve_ready(&state.loaded);
            }
            Err(e) => warn!(subject = %subject, error = %e, "read-ahead request failed"),
        }
    }

    /// Send one request per block that is neither loaded nor in flight.
    /// Returns how many were sent.
    fn request_blocks(&self, spec: &dyn RequestSpec, blocks: RangeInclusive<BlockIndex>) -> Result<usize> {
        let subject = spec.subject();
        let mut sent = 0;
        for block in blocks {
            {
                let mut state = self.inner.state.borrow_mut();
                if state.loaded.is_loaded(subject, block) {
                    continue;
                }
                let in_flight = state.in_flight.entry(subject.to_string()).or_default();
                if !in_flight.insert(block) {
                    continue;
                }
            }

            let bounds = self.inner.layout.bounds(block);
            debug!(subject = %subject, block, %bounds, "requesting block");
            // No borrow held: a synchronous transport may call on_batch from here
            if let Err(e) = self.inner.transport.send(spec.create_request(bounds.start, bounds.end)) {
                if let Some(set) = self.inner.state.borrow_mut().in_flight.get_mut(subject) {
                    set.remove(&block);
                }
                return Err(e);
            }
            sent += 1;
        }
        Ok(sent)
    }

    /// Apply an inbound batch: store items, mark blocks, wake waiters, notify.
    pub fn on_batch(&self, batch: Batch) {
        {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;
            for item in &batch.items {
                state.store.insert(&batch.subject, Arc::clone(item));
            }

            match self.inner.layout.aligned(batch.range) {
                Some(blocks) => {
                    let mut in_flight = state.in_flight.get_mut(&batch.subject);
                    for block in blocks {
                        state.loaded.mark(&batch.subject, block);
                        if let Some(set) = &mut in_flight {
                            set.remove(&block);
                        }
                    }
                }
                None => debug!(
                    subject = %batch.subject,
                    range = %batch.range,
                    "batch not block-aligned, blocks left unmarked"
                ),
            }

            let resolved = state.waiters.resolve_ready(&state.loaded);
            trace!(
                subject = %batch.subject,
                items = batch.items.len(),
                resolved,
                "batch applied"
            );
        }

        self.inner.observers.broadcast(&batch.items);
    }

    /// Decode and apply a raw inbound message.
    pub fn on_message(&self, message: serde_json::Value) -> Result<()> {
        BatchSink::on_message(self, message)
    }

    pub fn start_time(&self) -> Timestamp {
        self.inner.state.borrow().store.start_time()
    }

    pub fn end_time(&self) -> Timestamp {
        self.inner.state.borrow().store.end_time()
    }

    /// Drop records and loaded-state. Requests already in flight stay
    /// registered (their replies still arrive), as do pending waiters.
    pub fn clear(&self) {
        let mut state = self.inner.state.borrow_mut();
        state.store.clear();
        state.loaded.clear();
        debug!(pending = state.waiters.len(), "cache cleared");
    }

    pub fn is_loaded(&self, subject: &str, block: BlockIndex) -> bool {
        self.inner.state.borrow().loaded.is_loaded(subject, block)
    }

    /// Number of fetches waiting for blocks.
    pub fn pending_fetches(&self) -> usize {
        self.inner.state.borrow().waiters.len()
    }

    /// Blocks requested but not yet loaded for `subject`, ascending.
    pub fn in_flight(&self, subject: &str) -> Vec<BlockIndex> {
        let state = self.inner.state.borrow();
        let mut blocks: Vec<BlockIndex> = state
            .in_flight
            .get(subject)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        blocks.sort_unstable();
        blocks
    }

    /// Read access to the store. Don't hold the guard across an await.
    pub fn store(&self) -> Ref<'_, TimeBucketStore> {
        Ref::map(self.inner.state.borrow(), |state| &state.store)
    }

    /// Listen for every record the cache inserts.
    pub fn subscribe(&self, listener: Listener) -> ListenerId {
        self.inner.observers.add(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.observers.remove(id)
    }
}

impl BatchSink for BlockCacheProvider {
    fn on_batch(&self, batch: Batch) {
        BlockCacheProvider::on_batch(self, batch)
    }
}

#[async_trait(?Send)]
impl DataProvider for BlockCacheProvider {
    async fn get(&self, spec: &dyn RequestSpec, range: TimeRange) -> Result<Vec<Arc<Record>>> {
        BlockCacheProvider::get(self, spec, range).await
    }

    fn start_time(&self) -> Timestamp {
        BlockCacheProvider::start_time(self)
    }

    fn end_time(&self) -> Timestamp {
        BlockCacheProvider::end_time(self)
    }

    fn clear(&self) {
        BlockCacheProvider::clear(self)
    }
}

impl std::fmt::Debug for BlockCacheProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("BlockCacheProvider")
            .field("config", &self.inner.config)
            .field("records", &state.store.len())
            .field("pending", &state.waiters.len())
            .finish_non_exhaustive()
    }
}
