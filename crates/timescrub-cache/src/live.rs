//! Live provider: request-per-call, no retention.
//!
//! Each `fetch` sends exactly one request and completes with the next inbound
//! batch for the same subject, whatever range that batch declares. Concurrent
//! fetches for one subject each send their own request and are paired with
//! replies first-come-first-served. Batches nobody is waiting for are dropped.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{trace, warn};

use timescrub_types::{Batch, Record, Request, RequestSpec, TimeRange, Timestamp};

use crate::error::{CacheError, Result};
use crate::provider::DataProvider;
use crate::transport::{BatchSink, Transport};

struct Inner {
    transport: Rc<dyn Transport>,
    waiting: RefCell<HashMap<String, VecDeque<oneshot::Sender<Batch>>>>,
}

/// Non-caching provider for live streams.
#[derive(Clone)]
pub struct LiveProvider {
    inner: Rc<Inner>,
}

impl LiveProvider {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            inner: Rc::new(Inner {
                transport: Rc::new(transport),
                waiting: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Send `request` and wait for the next batch on its subject.
    pub async fn fetch(&self, request: Request) -> Result<Batch> {
        let subject = request.subject.clone();
        let (tx, rx) = oneshot::channel();
        self.inner
            .waiting
            .borrow_mut()
            .entry(subject.clone())
            .or_default()
            .push_back(tx);

        if let Err(e) = self.inner.transport.send(request) {
            // Remove our own waiter; it is the most recent for this subject
            let mut waiting = self.inner.waiting.borrow_mut();
            if let Some(queue) = waiting.get_mut(&subject) {
                queue.pop_back();
                if queue.is_empty() {
                    waiting.remove(&subject);
                }
            }
            return Err(e);
        }

        rx.await.map_err(|_| CacheError::FetchAbandoned { subject })
    }

    /// Hand a batch to the oldest waiter on its subject, or drop it.
    pub fn on_batch(&self, batch: Batch) {
        let mut batch = batch;
        loop {
            let waiter = {
                let mut waiting = self.inner.waiting.borrow_mut();
                let Some(queue) = waiting.get_mut(&batch.subject) else {
                    break;
                };
                let waiter = queue.pop_front();
                if queue.is_empty() {
                    waiting.remove(&batch.subject);
                }
                waiter
            };
            let Some(waiter) = waiter else { break };
            match waiter.send(batch) {
                Ok(()) => {
                    return;
                }
                // That fetch was dropped; try the next one in line
                Err(returned) => batch = returned,
            }
        }
        warn!(subject = %batch.subject, range = %batch.range, "live batch with no waiter dropped");
    }

    /// Decode and apply a raw inbound message.
    pub fn on_message(&self, message: serde_json::Value) -> Result<()> {
        BatchSink::on_message(self, message)
    }

    /// Outstanding fetches for `subject`.
    pub fn waiting(&self, subject: &str) -> usize {
        self.inner.waiting.borrow().get(subject).map_or(0, VecDeque::len)
    }
}

impl BatchSink for LiveProvider {
    fn on_batch(&self, batch: Batch) {
        LiveProvider::on_batch(self, batch)
    }
}

#[async_trait(?Send)]
impl DataProvider for LiveProvider {
    async fn get(&self, spec: &dyn RequestSpec, range: TimeRange) -> Result<Vec<Arc<Record>>> {
        let batch = self.fetch(spec.create_request(range.start, range.end)).await?;
        let mut items = batch.items;
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        trace!(subject = %spec.subject(), items = items.len(), "live fetch complete");
        Ok(items)
    }

    fn start_time(&self) -> Timestamp {
        0
    }

    fn end_time(&self) -> Timestamp {
        0
    }

    fn clear(&self) {}
}

impl std::fmt::Debug for LiveProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let waiting: usize = self.inner.waiting.borrow().values().map(VecDeque::len).sum();
        f.debug_struct("LiveProvider")
            .field("waiting", &waiting)
            .finish_non_exhaustive()
    }
}
