use super::outcome::{classify_build_error, classify_connect_error, classify_insert};
use super::{DeliveryWorker, DestinationSettings, DropReason, InsertOutcome};
use crate::document::{DocumentBuilder, ValuePairsWalker};
use crate::domain::{LogRecord, OnErrorPolicy};
use crate::store::{ConnectMode, ConnectionManager, StoreClient};
use std::borrow::Cow;
use std::time::Duration;
use tracing::{debug, error, warn};

const SCRATCH_CAPACITY: usize = 1024;

/// Turns records into documents and inserts them, one at a time.
///
/// Owns everything that is reused across records on the worker thread: the
/// connection, the document builder and a scratch buffer for rendering
/// records into log lines.
pub struct WorkerPipeline {
    connection: ConnectionManager,
    walker: ValuePairsWalker,
    builder: DocumentBuilder,
    scratch: Vec<u8>,
    time_reopen: Duration,
}

impl WorkerPipeline {
    pub fn new(settings: &DestinationSettings, client: Box<dyn StoreClient>) -> Self {
        Self {
            connection: ConnectionManager::new(client, settings.target.clone()),
            walker: settings.walker(),
            builder: DocumentBuilder::new(settings.on_error),
            scratch: Vec::with_capacity(SCRATCH_CAPACITY),
            time_reopen: settings.retry.base_delay,
        }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn policy(&self) -> OnErrorPolicy {
        self.builder.policy()
    }
}

impl DeliveryWorker for WorkerPipeline {
    fn thread_init(&mut self) {
        // Pre-warm only. The first insert connects again if this fails.
        if self.connection.ensure_connected(ConnectMode::Fresh).is_err() {
            warn!("Initial MongoDB connection failed, will retry on first record");
        }
    }

    fn insert(&mut self, record: &LogRecord) -> InsertOutcome {
        if let Err(e) = self.connection.ensure_connected(ConnectMode::Reuse) {
            return classify_connect_error(&e);
        }

        let silent = self.builder.policy().silent;
        let document = match self.builder.build(&self.walker, record) {
            Ok(document) => document,
            Err(e) => {
                if !silent {
                    error!(
                        record = %render(&mut self.scratch, record),
                        reason = %e,
                        "Failed to format message for MongoDB, dropping message"
                    );
                }
                return classify_build_error(&e);
            }
        };

        debug!(document = %document, "Outgoing message to MongoDB destination");

        let Some(collection) = self.connection.collection() else {
            return InsertOutcome::NotConnected("no collection handle".to_string());
        };
        let result = collection.insert(document);
        if let Err(e) = &result {
            error!(
                time_reopen = ?self.time_reopen,
                reason = %e,
                "Network error while inserting into MongoDB"
            );
        }
        classify_insert(result)
    }

    fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    fn permanent_failure(&mut self, record: &LogRecord, reason: DropReason) {
        match reason {
            DropReason::RetriesExhausted { attempts } => {
                error!(
                    number_of_retries = attempts,
                    record = %render(&mut self.scratch, record),
                    "Multiple failures while inserting this record into the database, message dropped"
                );
            }
            DropReason::Aborted { attempts } => {
                error!(
                    number_of_retries = attempts,
                    record = %render(&mut self.scratch, record),
                    "Delivery aborted during shutdown, message dropped"
                );
            }
            // Already reported by the builder or above, unless silenced.
            DropReason::Malformed => {}
        }
    }

    fn thread_deinit(&mut self) {
        self.connection.disconnect();
        self.builder.reset();
        self.scratch = Vec::new();
    }
}

/// Renders a record as one JSON line into the reused scratch buffer.
fn render<'a>(scratch: &'a mut Vec<u8>, record: &LogRecord) -> Cow<'a, str> {
    scratch.clear();
    if serde_json::to_writer(&mut *scratch, &record.rendered()).is_err() {
        return Cow::Borrowed("<unrenderable record>");
    }
    String::from_utf8_lossy(scratch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TypeHint;
    use crate::store::{
        MockStoreClient, MockStoreCollection, MockStoreSession, StoreCollection, StoreError,
        StoreSession, StoreTarget, StoreUri,
    };
    use crate::worker::destination::worker_span;
    use bson::doc;
    use tracing_test::traced_test;

    fn settings(on_error: OnErrorPolicy) -> DestinationSettings {
        let target = StoreTarget::new(
            StoreUri::parse("mongodb://localhost:27017/syslog").unwrap(),
            "messages",
        );
        DestinationSettings {
            on_error,
            ..DestinationSettings::new("mongodb", target)
        }
    }

    fn client_with_insert<F>(connects: usize, insert: F) -> MockStoreClient
    where
        F: Fn(&bson::Document) -> Result<(), StoreError> + Send + Sync + Clone + 'static,
    {
        let mut client = MockStoreClient::new();
        client.expect_connect().times(connects).returning(move |_| {
            let insert = insert.clone();
            let mut session = MockStoreSession::new();
            session.expect_collection().returning(move |_, _| {
                let insert = insert.clone();
                let mut collection = MockStoreCollection::new();
                collection
                    .expect_insert()
                    .returning(move |document| insert(document));
                Ok(Box::new(collection) as Box<dyn StoreCollection>)
            });
            Ok(Box::new(session) as Box<dyn StoreSession>)
        });
        client
    }

    #[test]
    fn test_insert_success_builds_typed_document() {
        let client = client_with_insert(1, |document| {
            assert_eq!(document, &doc! { "PID": 42_i32, "host": "web-1" });
            Ok(())
        });
        let mut pipeline = WorkerPipeline::new(&settings(OnErrorPolicy::default()), Box::new(client));

        let record = LogRecord::new()
            .with_field("host", TypeHint::String, "web-1")
            .with_field("PID", TypeHint::Int32, "42");

        assert_eq!(pipeline.insert(&record), InsertOutcome::Success);
        assert_eq!(pipeline.insert(&record), InsertOutcome::Success);
        assert_eq!(pipeline.connection().connect_count(), 1);
    }

    #[test]
    fn test_connect_failure_is_not_connected() {
        let mut client = MockStoreClient::new();
        client
            .expect_connect()
            .returning(|_| Err(StoreError::ConnectionFailed("refused".into())));
        let mut pipeline = WorkerPipeline::new(&settings(OnErrorPolicy::default()), Box::new(client));

        let record = LogRecord::new().with_field("a", TypeHint::String, "b");
        assert!(matches!(pipeline.insert(&record), InsertOutcome::NotConnected(_)));
    }

    #[test]
    fn test_malformed_record_is_dropped_without_insert() {
        let mut client = MockStoreClient::new();
        client.expect_connect().times(1).returning(|_| {
            let mut session = MockStoreSession::new();
            session.expect_collection().returning(|_, _| {
                let mut collection = MockStoreCollection::new();
                collection.expect_insert().never();
                Ok(Box::new(collection) as Box<dyn StoreCollection>)
            });
            Ok(Box::new(session) as Box<dyn StoreSession>)
        });
        let mut pipeline = WorkerPipeline::new(
            &settings(OnErrorPolicy::DROP_MESSAGE.silently()),
            Box::new(client),
        );

        let record = LogRecord::new().with_field("PID", TypeHint::Int32, "abc");
        assert_eq!(pipeline.insert(&record), InsertOutcome::Drop);
    }

    #[test]
    fn test_insert_errors_are_classified() {
        let client = client_with_insert(1, |_| Err(StoreError::InsertFailed("write concern".into())));
        let mut pipeline = WorkerPipeline::new(&settings(OnErrorPolicy::default()), Box::new(client));
        let record = LogRecord::new().with_field("a", TypeHint::String, "b");
        assert!(matches!(pipeline.insert(&record), InsertOutcome::Error(_)));

        let client = client_with_insert(1, |_| Err(StoreError::NotConnected("reset".into())));
        let mut pipeline = WorkerPipeline::new(&settings(OnErrorPolicy::default()), Box::new(client));
        assert!(matches!(pipeline.insert(&record), InsertOutcome::NotConnected(_)));
    }

    #[test]
    fn test_disconnect_forces_reconnect() {
        let client = client_with_insert(2, |_| Ok(()));
        let mut pipeline = WorkerPipeline::new(&settings(OnErrorPolicy::default()), Box::new(client));
        let record = LogRecord::new().with_field("a", TypeHint::String, "b");

        assert_eq!(pipeline.insert(&record), InsertOutcome::Success);
        pipeline.disconnect();
        assert!(!pipeline.connection().is_connected());
        assert_eq!(pipeline.insert(&record), InsertOutcome::Success);
        assert_eq!(pipeline.connection().connect_count(), 2);
    }

    #[test]
    fn test_thread_init_failure_is_ignored() {
        let mut client = MockStoreClient::new();
        client
            .expect_connect()
            .times(1)
            .returning(|_| Err(StoreError::ConnectionFailed("refused".into())));
        let mut pipeline = WorkerPipeline::new(&settings(OnErrorPolicy::default()), Box::new(client));

        pipeline.thread_init();
        assert!(!pipeline.connection().is_connected());
        pipeline.thread_deinit();
    }

    #[test]
    fn test_render_reuses_scratch() {
        let mut scratch = Vec::new();
        let record = LogRecord::new()
            .with_field("MESSAGE", TypeHint::String, "hello")
            .with_field("PID", TypeHint::Int32, "7");

        assert_eq!(render(&mut scratch, &record), r#"{"MESSAGE":"hello","PID":"7"}"#);
        let empty = LogRecord::new();
        assert_eq!(render(&mut scratch, &empty), "{}");
    }

    fn line_with<'a>(lines: &[&'a str], event: &str) -> Result<&'a str, String> {
        lines
            .iter()
            .copied()
            .find(|line| line.contains(event))
            .ok_or_else(|| format!("no '{event}' event logged"))
    }

    #[traced_test]
    #[test]
    fn test_cast_failure_is_logged_with_context() {
        let client = client_with_insert(1, |_| Ok(()));
        let mut pipeline =
            WorkerPipeline::new(&settings(OnErrorPolicy::DROP_MESSAGE), Box::new(client));
        let _span = worker_span("archive").entered();

        let record = LogRecord::new().with_field("PID", TypeHint::Int32, "abc");
        assert_eq!(pipeline.insert(&record), InsertOutcome::Drop);

        logs_assert(|lines: &[&str]| {
            let casting = line_with(lines, "Casting error")?;
            for expected in ["PID", "abc", "int32", "destination{driver=archive}"] {
                if !casting.contains(expected) {
                    return Err(format!("'{expected}' missing from: {casting}"));
                }
            }
            let dropped = line_with(lines, "Failed to format message for MongoDB, dropping message")?;
            if !dropped.contains("destination{driver=archive}") {
                return Err(format!("destination id missing from: {dropped}"));
            }
            Ok(())
        });
    }

    #[traced_test]
    #[test]
    fn test_silent_policy_suppresses_cast_diagnostics() {
        let client = client_with_insert(1, |_| Ok(()));
        let mut pipeline = WorkerPipeline::new(
            &settings(OnErrorPolicy::DROP_MESSAGE.silently()),
            Box::new(client),
        );

        let record = LogRecord::new().with_field("PID", TypeHint::Int32, "abc");
        assert_eq!(pipeline.insert(&record), InsertOutcome::Drop);

        assert!(!logs_contain("Casting error"));
        assert!(!logs_contain("Failed to format message"));
    }

    #[traced_test]
    #[test]
    fn test_exhaustion_logs_rendered_record() {
        let mut pipeline = WorkerPipeline::new(
            &settings(OnErrorPolicy::default()),
            Box::new(MockStoreClient::new()),
        );
        let record = LogRecord::new().with_field("MESSAGE", TypeHint::String, "disk full");

        pipeline.permanent_failure(&record, DropReason::RetriesExhausted { attempts: 3 });

        logs_assert(|lines: &[&str]| {
            let line = line_with(lines, "Multiple failures while inserting this record")?;
            if line.contains("number_of_retries=3") && line.contains(r#"{"MESSAGE":"disk full"}"#) {
                Ok(())
            } else {
                Err(format!("record or retry count missing from: {line}"))
            }
        });
    }

    #[traced_test]
    #[test]
    fn test_aborted_record_is_logged_for_recovery() {
        let mut pipeline = WorkerPipeline::new(
            &settings(OnErrorPolicy::default()),
            Box::new(MockStoreClient::new()),
        );
        let record = LogRecord::new().with_field("MESSAGE", TypeHint::String, "late line");

        pipeline.permanent_failure(&record, DropReason::Aborted { attempts: 0 });
        pipeline.permanent_failure(&record, DropReason::Malformed);

        assert!(logs_contain("Delivery aborted during shutdown, message dropped"));
        assert!(logs_contain("late line"));
        assert!(!logs_contain("Multiple failures"));
    }
}
