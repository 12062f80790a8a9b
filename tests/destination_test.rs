mod common;

use bson::doc;
use common::{FakeStore, fast_settings};
use rask_mongo_writer::domain::{LogRecord, OnErrorPolicy, TypeHint};
use rask_mongo_writer::reliability::{
    DeliveryResult, DeliveryScheduler, RetryConfig, RetryManager, RetryStrategy,
};
use rask_mongo_writer::store::StoreError;
use rask_mongo_writer::worker::{
    Destination, DestinationSettings, DestinationStats, DropReason, WorkerPipeline,
};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

fn message(text: &str) -> LogRecord {
    LogRecord::new().with_field("MESSAGE", TypeHint::String, text)
}

fn scheduler(
    store: &FakeStore,
    settings: &DestinationSettings,
) -> (DeliveryScheduler<WorkerPipeline>, Arc<DestinationStats>) {
    let stats = Arc::new(DestinationStats::new(settings.stats_instance()));
    let scheduler = DeliveryScheduler::new(
        WorkerPipeline::new(settings, Box::new(store.clone())),
        RetryManager::new(settings.retry.clone()),
        Arc::clone(&stats),
        Arc::new(AtomicBool::new(false)),
    );
    (scheduler, stats)
}

#[test]
fn test_transient_failure_is_retried_once_stored() {
    let store = FakeStore::new();
    store.fail_next_inserts([StoreError::InsertFailed("primary stepped down".to_string())]);
    let (mut scheduler, stats) = scheduler(&store, &fast_settings());

    assert_eq!(
        scheduler.deliver(&message("hello")),
        DeliveryResult::Delivered { attempts: 2 }
    );
    assert_eq!(store.documents(), vec![doc! { "MESSAGE": "hello" }]);
    assert_eq!(stats.snapshot().retried, 1);
}

#[test]
fn test_lost_connection_is_rebuilt_between_attempts() {
    let store = FakeStore::new();
    store.fail_next_inserts([StoreError::NotConnected("socket closed".to_string())]);
    let (mut scheduler, stats) = scheduler(&store, &fast_settings());

    assert_eq!(
        scheduler.deliver(&message("hello")),
        DeliveryResult::Delivered { attempts: 2 }
    );
    assert_eq!(store.connects(), 2);
    assert_eq!(stats.snapshot().connection_failures, 1);
}

#[test]
fn test_unreachable_store_exhausts_retries() {
    let store = FakeStore::unreachable();
    let (mut scheduler, stats) = scheduler(&store, &fast_settings());

    assert_eq!(
        scheduler.deliver(&message("lost")),
        DeliveryResult::Dropped(DropReason::RetriesExhausted { attempts: 3 })
    );

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.dropped, 1);
    assert_eq!(snapshot.connection_failures, 3);
    assert_eq!(snapshot.written, 0);
}

#[test]
fn test_malformed_record_is_not_retried() {
    let store = FakeStore::new();
    let settings = DestinationSettings {
        on_error: OnErrorPolicy::DROP_MESSAGE.silently(),
        ..fast_settings()
    };
    let (mut scheduler, stats) = scheduler(&store, &settings);

    let record = LogRecord::new().with_field("PID", TypeHint::Int32, "not-a-number");
    assert_eq!(
        scheduler.deliver(&record),
        DeliveryResult::Dropped(DropReason::Malformed)
    );
    assert_eq!(store.insert_calls(), 0);
    assert_eq!(stats.snapshot().retried, 0);
}

#[test]
fn test_store_recovers_during_backoff() {
    let store = FakeStore::unreachable();
    let settings = DestinationSettings {
        retry: RetryConfig {
            max_attempts: 50,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(10),
            strategy: RetryStrategy::Fixed,
            jitter: false,
        },
        ..fast_settings()
    };
    let (mut scheduler, _stats) = scheduler(&store, &settings);

    let recovering = store.clone();
    let toggler = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        recovering.set_reachable(true);
    });

    let result = scheduler.deliver(&message("eventually"));
    toggler.join().unwrap();

    assert!(matches!(result, DeliveryResult::Delivered { attempts } if attempts > 1));
    assert_eq!(store.documents(), vec![doc! { "MESSAGE": "eventually" }]);
}

#[test]
fn test_destination_delivers_in_order_and_drains_on_shutdown() {
    let store = FakeStore::new();
    let destination = Destination::start(fast_settings(), Box::new(store.clone())).unwrap();

    for i in 0..20 {
        destination.blocking_send(message(&format!("line {i}"))).unwrap();
    }

    let stats = destination.shutdown().unwrap();
    assert_eq!(stats.queued, 20);
    assert_eq!(stats.written, 20);
    assert_eq!(stats.in_flight(), 0);
    assert_eq!(
        stats.instance,
        "mongodb,mongodb://127.0.0.1:27017/syslog,messages"
    );

    let messages: Vec<String> = store
        .documents()
        .iter()
        .map(|document| document.get_str("MESSAGE").unwrap().to_string())
        .collect();
    let expected: Vec<String> = (0..20).map(|i| format!("line {i}")).collect();
    assert_eq!(messages, expected);
}

#[test]
fn test_abort_interrupts_long_backoff() {
    let store = FakeStore::unreachable();
    let settings = DestinationSettings {
        retry: RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_secs(3600),
            max_delay: Duration::from_secs(3600),
            strategy: RetryStrategy::Fixed,
            jitter: false,
        },
        ..fast_settings()
    };
    let destination = Destination::start(settings, Box::new(store.clone())).unwrap();
    destination.blocking_send(message("stuck")).unwrap();
    destination.blocking_send(message("queued")).unwrap();

    std::thread::sleep(Duration::from_millis(100));
    let started = Instant::now();
    destination.abort_handle().abort();
    let stats = destination.shutdown().unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(stats.written, 0);
    assert_eq!(stats.dropped, 2);
    assert_eq!(stats.in_flight(), 0);
    assert!(store.documents().is_empty());
}

#[tokio::test]
async fn test_async_send() {
    let store = FakeStore::new();
    let destination = Destination::start(fast_settings(), Box::new(store.clone())).unwrap();

    destination.send(message("from async")).await.unwrap();
    let stats = tokio::task::spawn_blocking(move || destination.shutdown())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(stats.written, 1);
    assert_eq!(store.documents(), vec![doc! { "MESSAGE": "from async" }]);
}
