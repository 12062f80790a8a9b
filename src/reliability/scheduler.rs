use super::retry::RetryManager;
use crate::domain::LogRecord;
use crate::worker::{DeliveryWorker, DestinationStats, DropReason, InsertOutcome};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Granularity at which backoff waits notice an abort.
const ABORT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryResult {
    Delivered { attempts: u32 },
    Dropped(DropReason),
}

/// Feeds records to a worker one at a time and owns the retry policy.
///
/// `Error` and `NotConnected` both spend one attempt; `NotConnected`
/// additionally tells the worker to drop its connection. `Drop` ends the
/// record immediately.
pub struct DeliveryScheduler<W: DeliveryWorker> {
    worker: W,
    retry: RetryManager,
    stats: Arc<DestinationStats>,
    abort: Arc<AtomicBool>,
}

impl<W: DeliveryWorker> DeliveryScheduler<W> {
    pub fn new(
        worker: W,
        retry: RetryManager,
        stats: Arc<DestinationStats>,
        abort: Arc<AtomicBool>,
    ) -> Self {
        Self {
            worker,
            retry,
            stats,
            abort,
        }
    }

    pub fn deliver(&mut self, record: &LogRecord) -> DeliveryResult {
        self.retry.start();
        let result = self.attempt_until_resolved(record);
        self.stats.record_processed();
        result
    }

    fn attempt_until_resolved(&mut self, record: &LogRecord) -> DeliveryResult {
        loop {
            match self.worker.insert(record) {
                InsertOutcome::Success => {
                    self.stats.record_written();
                    return DeliveryResult::Delivered {
                        attempts: self.retry.attempt_count() + 1,
                    };
                }
                InsertOutcome::Drop => return self.give_up(record, DropReason::Malformed),
                InsertOutcome::NotConnected(reason) => {
                    debug!(reason = %reason, "Connection lost, dropping client");
                    self.stats.record_connection_failure();
                    self.worker.disconnect();
                }
                InsertOutcome::Error(reason) => {
                    debug!(reason = %reason, "Insert attempt failed");
                }
            }

            let attempts = self.retry.record_failure();
            if self.retry.should_give_up() {
                debug!(attempts, elapsed = ?self.retry.elapsed(), "Giving up on record");
                return self.give_up(record, DropReason::RetriesExhausted { attempts });
            }

            self.stats.record_retry();
            let delay = self.retry.calculate_delay(attempts - 1);
            debug!(attempt = attempts + 1, ?delay, "Retrying record");
            if !self.wait(delay) {
                warn!(attempts, "Shutdown requested while waiting to retry, record not delivered");
                return self.give_up(record, DropReason::Aborted { attempts });
            }
        }
    }

    fn give_up(&mut self, record: &LogRecord, reason: DropReason) -> DeliveryResult {
        self.stats.record_dropped();
        self.worker.permanent_failure(record, reason);
        DeliveryResult::Dropped(reason)
    }

    /// Sleeps for `delay` unless aborted first. Returns false on abort.
    fn wait(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            if self.abort.load(Ordering::Acquire) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(ABORT_POLL_INTERVAL));
        }
    }

    /// Worker thread body. Returns once the queue is closed and drained, or
    /// right after an abort.
    pub fn run(mut self, mut records: mpsc::Receiver<LogRecord>) {
        self.worker.thread_init();

        while let Some(record) = records.blocking_recv() {
            if self.abort.load(Ordering::Acquire) {
                records.close();
                let mut skipped = 0_u64;
                let mut pending = Some(record);
                while let Some(record) = pending {
                    self.give_up(&record, DropReason::Aborted { attempts: 0 });
                    self.stats.record_processed();
                    skipped += 1;
                    pending = records.try_recv().ok();
                }
                warn!(skipped, "Worker aborted, queued records not delivered");
                break;
            }
            self.deliver(&record);
        }

        self.worker.thread_deinit();
        info!("Worker finished");
    }
}
