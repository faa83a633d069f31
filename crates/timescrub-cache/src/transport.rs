//! Outbound request sink and inbound message pump.
//!
//! ```text
//!   provider ──Transport::send(Request)──▶ remote
//!   provider ◀──BatchSink::on_message──── pump(rx) ◀── remote (raw JSON)
//! ```
//!
//! The pump drains one message at a time and hands it to the sink before
//! reading the next, so batch processing never interleaves.

use std::rc::Rc;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error};

use timescrub_types::{Batch, Request};

use crate::error::{CacheError, Result};

/// Fire-and-forget outbound request channel.
///
/// `send` may deliver the reply synchronously (re-entering the provider's
/// `on_batch` before returning); providers never hold state borrows across it.
pub trait Transport {
    fn send(&self, request: Request) -> Result<()>;
}

impl Transport for mpsc::UnboundedSender<Request> {
    fn send(&self, request: Request) -> Result<()> {
        mpsc::UnboundedSender::send(self, request).map_err(|_| CacheError::TransportClosed)
    }
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
    fn send(&self, request: Request) -> Result<()> {
        (**self).send(request)
    }
}

/// Receiver of inbound batches.
pub trait BatchSink {
    fn on_batch(&self, batch: Batch);

    /// Decode and apply a raw message. Malformed input fails fast.
    fn on_message(&self, message: Value) -> Result<()> {
        let batch = Batch::decode(message)?;
        self.on_batch(batch);
        Ok(())
    }
}

impl<S: BatchSink + ?Sized> BatchSink for Rc<S> {
    fn on_batch(&self, batch: Batch) {
        (**self).on_batch(batch)
    }
}

/// Feed inbound messages to `sink` until the channel closes.
///
/// Returns the first [`ProtocolViolation`](timescrub_types::ProtocolViolation)
/// encountered; nothing after it is processed.
pub async fn pump<S>(sink: &S, mut rx: mpsc::UnboundedReceiver<Value>) -> Result<()>
where
    S: BatchSink + ?Sized,
{
    while let Some(message) = rx.recv().await {
        if let Err(e) = sink.on_message(message) {
            error!(error = %e, "inbound pump stopped");
            return Err(e);
        }
    }
    debug!("inbound channel closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use timescrub_types::TimeRange;

    #[derive(Default)]
    struct CollectingSink {
        batches: RefCell<Vec<Batch>>,
    }

    impl BatchSink for CollectingSink {
        fn on_batch(&self, batch: Batch) {
            self.batches.borrow_mut().push(batch);
        }
    }

    fn message(subject: &str, start: i64, end: i64) -> Value {
        json!({ "subject": subject, "startTime": start, "endTime": end, "items": [] })
    }

    #[tokio::test]
    async fn test_pump_drains_in_order_until_closed() {
        let sink = CollectingSink::default();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(message("a", 0, 99)).unwrap();
        tx.send(message("b", 100, 199)).unwrap();
        drop(tx);

        pump(&sink, rx).await.unwrap();
        let batches = sink.batches.borrow();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].subject, "a");
        assert_eq!(batches[1].range, TimeRange::new(100, 199));
    }

    #[tokio::test]
    async fn test_pump_fails_fast_on_malformed_message() {
        let sink = CollectingSink::default();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(message("a", 0, 99)).unwrap();
        tx.send(json!({ "nope": true })).unwrap();
        tx.send(message("c", 0, 99)).unwrap();
        drop(tx);

        let err = pump(&sink, rx).await.unwrap_err();
        assert!(matches!(err, CacheError::Protocol(_)));
        // Nothing after the bad message was applied
        assert_eq!(sink.batches.borrow().len(), 1);
    }

    #[test]
    fn test_channel_transport_reports_closed() {
        let (tx, rx) = mpsc::unbounded_channel::<Request>();
        let request = Request::new("a", TimeRange::new(0, 99));
        assert!(Transport::send(&tx, request.clone()).is_ok());
        drop(rx);
        assert_eq!(Transport::send(&tx, request), Err(CacheError::TransportClosed));
    }
}
