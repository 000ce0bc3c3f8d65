//! A streaming progress/cancellation protocol for operations that run long
//! enough to be worth observing: CAR export/import, `dag sync`, `syncss`.
//!
//! Producers update cheap atomic counters as work happens; a background
//! task samples them every `cadence` (50 ms by default) and pushes a
//! [`ProgressEvent`] onto a [`tokio::sync::watch`] channel. `watch` is the
//! right primitive here because a slow or absent observer must never block
//! the producer: a new sample simply overwrites whatever the observer
//! hasn't read yet, which is exactly the coalescing this protocol requires.

mod error;

pub use error::{Error, Result};

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default sampling cadence for a [`ProgressReporter`]'s background ticker.
pub const DEFAULT_CADENCE: Duration = Duration::from_millis(50);

/// One sample of an operation's progress: how far along it is (`current`
/// out of `total`), the last status message, and, once the operation has
/// failed, a non-empty `err`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressEvent {
    pub total: i64,
    pub current: i64,
    pub msg: String,
    pub err: String,
}

#[derive(Default)]
struct Counters {
    total: AtomicI64,
    current: AtomicI64,
}

/// Producer handle for a progress stream. Cheap to call from hot loops:
/// [`ProgressReporter::advance`] and [`ProgressReporter::set_total`] only
/// touch atomics; the background ticker is what actually pushes samples.
pub struct ProgressReporter {
    counters: Arc<Counters>,
    message: Arc<Mutex<String>>,
    tx: watch::Sender<ProgressEvent>,
    closed: Arc<AtomicBool>,
    ticker: JoinHandle<()>,
}

impl ProgressReporter {
    /// Start a reporter sampling at `cadence`. The returned receiver's
    /// initial value is the zeroed [`ProgressEvent`]. Sampling stops when
    /// `cancel` fires or [`ProgressReporter::close`] is called.
    pub fn start(cadence: Duration, cancel: CancellationToken) -> (Self, watch::Receiver<ProgressEvent>) {
        let counters = Arc::new(Counters::default());
        let message = Arc::new(Mutex::new(String::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let (tx, rx) = watch::channel(ProgressEvent::default());

        let ticker = {
            let counters = counters.clone();
            let message = message.clone();
            let tx = tx.clone();
            let closed = closed.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(cadence);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if closed.load(Ordering::Acquire) {
                                break;
                            }
                            let event = ProgressEvent {
                                total: counters.total.load(Ordering::Relaxed),
                                current: counters.current.load(Ordering::Relaxed),
                                msg: message.lock().clone(),
                                err: String::new(),
                            };
                            if tx.send(event).is_err() {
                                break;
                            }
                        }
                        _ = cancel.cancelled() => break,
                    }
                }
            })
        };

        (
            ProgressReporter {
                counters,
                message,
                tx,
                closed,
                ticker,
            },
            rx,
        )
    }

    pub fn set_total(&self, total: i64) {
        self.counters.total.store(total, Ordering::Relaxed);
    }

    pub fn advance(&self, delta: i64) {
        self.counters.current.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn set_message(&self, msg: impl Into<String>) {
        *self.message.lock() = msg.into();
    }

    /// Emit an immediate, out-of-band sample carrying `err`, bypassing the
    /// cadence. Used to report a terminal failure without waiting for the
    /// next tick.
    pub fn fail(&self, err: impl Into<String>) -> Result<()> {
        let event = ProgressEvent {
            total: self.counters.total.load(Ordering::Relaxed),
            current: self.counters.current.load(Ordering::Relaxed),
            msg: self.message.lock().clone(),
            err: err.into(),
        };
        self.tx.send(event).map_err(|_| Error::NoReceivers)
    }

    /// Close the reporter. Closing twice is a contract violation: it is
    /// logged and, in debug builds, asserted, but never panics in release.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            tracing::warn!("progress reporter closed more than once");
            debug_assert!(false, "progress reporter closed more than once");
            return;
        }
        self.ticker.abort();
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.ticker.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_progress_samples_at_cadence() {
        let (reporter, mut rx) = ProgressReporter::start(Duration::from_millis(10), CancellationToken::new());
        reporter.set_total(100);
        reporter.advance(40);

        rx.changed().await.unwrap();
        let event = rx.borrow().clone();
        assert_eq!(event.total, 100);
        assert_eq!(event.current, 40);
        assert!(event.err.is_empty());

        reporter.close();
    }

    #[tokio::test]
    async fn fail_emits_immediately_with_err_set() {
        let (reporter, mut rx) = ProgressReporter::start(Duration::from_secs(3600), CancellationToken::new());
        reporter.set_total(10);
        reporter.advance(3);
        reporter.fail("boom").unwrap();

        rx.changed().await.unwrap();
        let event = rx.borrow().clone();
        assert_eq!(event.err, "boom");
        assert_eq!(event.current, 3);

        reporter.close();
    }

    #[tokio::test]
    async fn cancellation_stops_the_ticker() {
        let cancel = CancellationToken::new();
        let (reporter, _rx) = ProgressReporter::start(Duration::from_millis(10), cancel.clone());
        cancel.cancel();
        tokio::time::sleep(Duration::from_millis(30)).await;
        // The ticker task should have exited; closing should still be safe.
        reporter.close();
    }

    #[tokio::test]
    #[should_panic(expected = "closed more than once")]
    async fn double_close_is_caught_by_debug_assertion() {
        let (reporter, _rx) = ProgressReporter::start(Duration::from_millis(10), CancellationToken::new());
        reporter.close();
        reporter.close();
    }
}
