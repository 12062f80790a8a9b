// Lock-free destination statistics.
//
// Counters are bumped from the worker thread and read from anywhere through
// snapshots.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug)]
pub struct DestinationStats {
    instance: String,
    queued: AtomicU64,
    processed: AtomicU64,
    written: AtomicU64,
    dropped: AtomicU64,
    retried: AtomicU64,
    connection_failures: AtomicU64,
    last_record_at: AtomicU64,
}

impl DestinationStats {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            queued: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            written: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            retried: AtomicU64::new(0),
            connection_failures: AtomicU64::new(0),
            last_record_at: AtomicU64::new(0),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// A record was handed to the destination queue.
    pub fn record_queued(&self) {
        self.queued.fetch_add(1, Ordering::Relaxed);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.last_record_at.store(now, Ordering::Relaxed);
    }

    /// A record left the scheduler, whatever its fate.
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_failure(&self) {
        self.connection_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DestinationStatsSnapshot {
        DestinationStatsSnapshot {
            instance: self.instance.clone(),
            queued: self.queued.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            connection_failures: self.connection_failures.load(Ordering::Relaxed),
            last_record_at: self.last_record_at.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationStatsSnapshot {
    pub instance: String,
    pub queued: u64,
    pub processed: u64,
    pub written: u64,
    pub dropped: u64,
    pub retried: u64,
    pub connection_failures: u64,
    /// Unix seconds of the last queued record, 0 if none yet.
    pub last_record_at: u64,
}

impl DestinationStatsSnapshot {
    /// Records accepted but not yet resolved.
    pub fn in_flight(&self) -> u64 {
        self.queued.saturating_sub(self.processed)
    }
}
