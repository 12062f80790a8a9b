#![allow(dead_code)]

use bson::Document;
use parking_lot::Mutex;
use rask_mongo_writer::store::{
    StoreClient, StoreCollection, StoreError, StoreSession, StoreTarget, StoreUri,
};
use rask_mongo_writer::worker::DestinationSettings;
use rask_mongo_writer::reliability::{RetryConfig, RetryStrategy};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct FakeState {
    unreachable: bool,
    connects: usize,
    insert_calls: usize,
    failures: VecDeque<StoreError>,
    stored: Vec<(String, String, Document)>,
}

/// In-memory stand-in for a MongoDB deployment, shared by clones.
#[derive(Debug, Clone, Default)]
pub struct FakeStore {
    state: Arc<Mutex<FakeState>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        let store = Self::default();
        store.set_reachable(false);
        store
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().unreachable = !reachable;
    }

    /// Queues errors returned by the next inserts, in order.
    pub fn fail_next_inserts(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.state.lock().failures.extend(errors);
    }

    pub fn documents(&self) -> Vec<Document> {
        self.state
            .lock()
            .stored
            .iter()
            .map(|(_, _, document)| document.clone())
            .collect()
    }

    pub fn namespaces(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .stored
            .iter()
            .map(|(database, collection, _)| (database.clone(), collection.clone()))
            .collect()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    pub fn insert_calls(&self) -> usize {
        self.state.lock().insert_calls
    }
}

impl StoreClient for FakeStore {
    fn connect(&self, uri: &str) -> Result<Box<dyn StoreSession>, StoreError> {
        let mut state = self.state.lock();
        if state.unreachable {
            return Err(StoreError::ConnectionFailed(format!("{uri} unreachable")));
        }
        state.connects += 1;
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeSession {
    state: Arc<Mutex<FakeState>>,
}

impl StoreSession for FakeSession {
    fn collection(
        &self,
        database: &str,
        name: &str,
    ) -> Result<Box<dyn StoreCollection>, StoreError> {
        Ok(Box::new(FakeCollection {
            state: Arc::clone(&self.state),
            database: database.to_string(),
            name: name.to_string(),
        }))
    }
}

struct FakeCollection {
    state: Arc<Mutex<FakeState>>,
    database: String,
    name: String,
}

impl StoreCollection for FakeCollection {
    fn insert(&self, document: &Document) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.insert_calls += 1;
        if state.unreachable {
            return Err(StoreError::NotConnected("connection reset".to_string()));
        }
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }
        state
            .stored
            .push((self.database.clone(), self.name.clone(), document.clone()));
        Ok(())
    }
}

pub fn target() -> StoreTarget {
    StoreTarget::new(
        StoreUri::parse("mongodb://127.0.0.1:27017/syslog").unwrap(),
        "messages",
    )
}

/// Settings with millisecond backoff so retry tests stay fast.
pub fn fast_settings() -> DestinationSettings {
    DestinationSettings {
        retry: RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            strategy: RetryStrategy::Fixed,
            jitter: false,
        },
        queue_capacity: 64,
        ..DestinationSettings::new("mongodb", target())
    }
}
