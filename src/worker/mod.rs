//! Per-destination delivery.
//!
//! A [`Destination`] owns one worker thread. The thread runs a
//! [`DeliveryScheduler`](crate::reliability::DeliveryScheduler) that feeds
//! records one at a time to a [`DeliveryWorker`], normally the
//! [`WorkerPipeline`] talking to MongoDB.

pub mod destination;
pub mod outcome;
pub mod pipeline;
pub mod stats;

pub use destination::{AbortHandle, Destination, DestinationError, DestinationSettings};
pub use outcome::{InsertOutcome, classify_build_error, classify_connect_error, classify_insert};
pub use pipeline::WorkerPipeline;
pub use stats::{DestinationStats, DestinationStatsSnapshot};

use crate::domain::LogRecord;
use std::fmt;

#[cfg(test)]
use mockall::automock;

/// Why a record was given up on for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The record could not be turned into a document.
    Malformed,
    /// Every allowed attempt failed.
    RetriesExhausted { attempts: u32 },
    /// An abort stopped delivery before the record was resolved. `attempts`
    /// is 0 for records that were still queued.
    Aborted { attempts: u32 },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Malformed => f.write_str("malformed record"),
            DropReason::RetriesExhausted { attempts } => {
                write!(f, "retries exhausted after {attempts} attempt(s)")
            }
            DropReason::Aborted { attempts } => {
                write!(f, "aborted after {attempts} attempt(s)")
            }
        }
    }
}

/// The per-thread operations a scheduler drives.
///
/// All calls happen on the worker thread, in this order: `thread_init`
/// once, then any number of `insert` / `disconnect` / `permanent_failure`,
/// then `thread_deinit` once.
#[cfg_attr(test, automock)]
pub trait DeliveryWorker: Send {
    fn thread_init(&mut self);

    fn insert(&mut self, record: &LogRecord) -> InsertOutcome;

    fn disconnect(&mut self);

    fn permanent_failure(&mut self, record: &LogRecord, reason: DropReason);

    fn thread_deinit(&mut self);
}
