use super::stats::{DestinationStats, DestinationStatsSnapshot};
use super::WorkerPipeline;
use crate::document::{FieldSelection, KeyTransforms, ValuePairsWalker};
use crate::domain::{LogRecord, OnErrorPolicy};
use crate::reliability::{DeliveryScheduler, RetryConfig, RetryManager};
use crate::store::{StoreClient, StoreTarget};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{Span, info, info_span};

pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

#[derive(Error, Debug)]
pub enum DestinationError {
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Destination worker is no longer running")]
    WorkerGone,
    #[error("Destination worker panicked")]
    WorkerPanicked,
}

/// Everything one destination instance needs, fully validated.
#[derive(Debug, Clone)]
pub struct DestinationSettings {
    pub id: String,
    pub target: StoreTarget,
    pub on_error: OnErrorPolicy,
    pub exclude: Vec<String>,
    pub retry: RetryConfig,
    pub queue_capacity: usize,
}

impl DestinationSettings {
    pub fn new(id: impl Into<String>, target: StoreTarget) -> Self {
        Self {
            id: id.into(),
            target,
            on_error: OnErrorPolicy::default(),
            exclude: Vec::new(),
            retry: RetryConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Name under which this destination's counters are reported.
    pub fn stats_instance(&self) -> String {
        format!(
            "mongodb,{},{}",
            self.target.uri.redacted(),
            self.target.collection
        )
    }

    /// Stable name identifying this destination across restarts.
    pub fn persist_name(&self) -> String {
        format!(
            "mongodb({},{})",
            self.target.uri.redacted(),
            self.target.collection
        )
    }

    pub fn walker(&self) -> ValuePairsWalker {
        ValuePairsWalker::new(
            KeyTransforms::mongodb_defaults(),
            FieldSelection::new(self.exclude.clone()),
        )
    }
}

/// Span entered by a destination's worker thread for its whole lifetime.
pub(crate) fn worker_span(id: &str) -> Span {
    info_span!("destination", driver = %id)
}

#[derive(Debug, Clone)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A running destination: a bounded queue in front of one worker thread.
pub struct Destination {
    id: String,
    sender: mpsc::Sender<LogRecord>,
    worker: JoinHandle<()>,
    abort: Arc<AtomicBool>,
    stats: Arc<DestinationStats>,
}

impl Destination {
    pub fn start(
        settings: DestinationSettings,
        client: Box<dyn StoreClient>,
    ) -> Result<Self, DestinationError> {
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let stats = Arc::new(DestinationStats::new(settings.stats_instance()));
        let abort = Arc::new(AtomicBool::new(false));

        let pipeline = WorkerPipeline::new(&settings, client);
        let scheduler = DeliveryScheduler::new(
            pipeline,
            RetryManager::new(settings.retry.clone()),
            Arc::clone(&stats),
            Arc::clone(&abort),
        );

        let id = settings.id.clone();
        let span_id = settings.id.clone();
        let worker = thread::Builder::new()
            .name(format!("{id}-worker"))
            .spawn(move || {
                let _entered = worker_span(&span_id).entered();
                scheduler.run(receiver);
            })
            .map_err(DestinationError::Spawn)?;

        info!(
            driver = %id,
            uri = %settings.target.uri,
            database = settings.target.database(),
            collection = %settings.target.collection,
            persist_name = %settings.persist_name(),
            "Initializing MongoDB destination"
        );

        Ok(Self {
            id,
            sender,
            worker,
            abort,
            stats,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Queues a record, waiting for room if the queue is full.
    pub async fn send(&self, record: LogRecord) -> Result<(), DestinationError> {
        self.sender
            .send(record)
            .await
            .map_err(|_| DestinationError::WorkerGone)?;
        self.stats.record_queued();
        Ok(())
    }

    /// Like [`send`](Self::send) for callers outside an async runtime.
    pub fn blocking_send(&self, record: LogRecord) -> Result<(), DestinationError> {
        self.sender
            .blocking_send(record)
            .map_err(|_| DestinationError::WorkerGone)?;
        self.stats.record_queued();
        Ok(())
    }

    pub fn stats(&self) -> DestinationStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stops retry waits and makes the worker skip whatever is still queued.
    pub fn abort(&self) {
        self.abort.store(true, Ordering::Release);
    }

    /// A handle that can abort the worker while [`shutdown`](Self::shutdown)
    /// is blocked draining it.
    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle(Arc::clone(&self.abort))
    }

    /// Closes the queue and waits for the worker to drain it. Blocks.
    pub fn shutdown(self) -> Result<DestinationStatsSnapshot, DestinationError> {
        let Destination {
            id,
            sender,
            worker,
            stats,
            ..
        } = self;
        drop(sender);

        worker.join().map_err(|_| DestinationError::WorkerPanicked)?;
        let snapshot = stats.snapshot();
        info!(
            driver = %id,
            written = snapshot.written,
            dropped = snapshot.dropped,
            "MongoDB destination stopped"
        );
        Ok(snapshot)
    }
}
