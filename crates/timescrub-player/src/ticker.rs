//! Repeating frame timer with an explicit cancel handle.
//!
//! The ticker runs in a `spawn_local` task and calls its callback once per
//! period; ticks missed while a callback was still running are skipped, not
//! replayed. Cancellation is checked between ticks, so a callback already in
//! progress always runs to completion.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Handle to a running frame loop. Dropping it cancels the loop.
#[derive(Debug)]
pub struct FrameTicker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl FrameTicker {
    /// Start ticking every `period`. The first tick fires immediately.
    ///
    /// Must be called from within a `tokio::task::LocalSet` context.
    pub fn spawn<F, Fut>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Fut + 'static,
        Fut: Future<Output = ControlFlow<()>> + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::task::spawn_local(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;

                    _ = token.cancelled() => {
                        trace!("frame ticker cancelled");
                        break;
                    }

                    _ = interval.tick() => {
                        if on_tick().await.is_break() {
                            trace!("frame ticker finished");
                            break;
                        }
                    }
                }
            }
        });

        Self { cancel, handle }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// True once the loop task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for FrameTicker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use tokio::task::LocalSet;

    fn run_local<F: Future<Output = ()>>(f: F) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        rt.block_on(LocalSet::new().run_until(f));
    }

    #[test]
    fn test_ticks_until_cancelled() {
        run_local(async {
            let ticks = Rc::new(Cell::new(0));
            let t = ticks.clone();
            let ticker = FrameTicker::spawn(Duration::from_millis(10), move || {
                t.set(t.get() + 1);
                async { ControlFlow::Continue(()) }
            });

            // Ticks at 0, 10, 20
            time::sleep(Duration::from_millis(25)).await;
            assert_eq!(ticks.get(), 3);

            ticker.cancel();
            assert!(ticker.is_cancelled());
            time::sleep(Duration::from_millis(50)).await;
            assert_eq!(ticks.get(), 3);
            assert!(ticker.is_finished());
        });
    }

    #[test]
    fn test_break_ends_loop() {
        run_local(async {
            let ticks = Rc::new(Cell::new(0));
            let t = ticks.clone();
            let ticker = FrameTicker::spawn(Duration::from_millis(10), move || {
                t.set(t.get() + 1);
                let n = t.get();
                async move {
                    if n == 2 {
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                }
            });

            time::sleep(Duration::from_millis(100)).await;
            assert_eq!(ticks.get(), 2);
            assert!(ticker.is_finished());
        });
    }

    #[test]
    fn test_drop_cancels() {
        run_local(async {
            let ticks = Rc::new(Cell::new(0));
            let t = ticks.clone();
            let ticker = FrameTicker::spawn(Duration::from_millis(10), move || {
                t.set(t.get() + 1);
                async { ControlFlow::Continue(()) }
            });
            time::sleep(Duration::from_millis(5)).await;
            drop(ticker);
            time::sleep(Duration::from_millis(50)).await;
            assert_eq!(ticks.get(), 1);
        });
    }
}
