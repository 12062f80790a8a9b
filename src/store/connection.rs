use super::{StoreClient, StoreCollection, StoreError, StoreSession, StoreUri};
use tracing::{debug, error};

/// Where records go: a connection string plus the collection inside its
/// database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreTarget {
    pub uri: StoreUri,
    pub collection: String,
}

impl StoreTarget {
    pub fn new(uri: StoreUri, collection: impl Into<String>) -> Self {
        Self {
            uri,
            collection: collection.into(),
        }
    }

    pub fn database(&self) -> &str {
        self.uri.database()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    /// Keep a live connection if there is one.
    Reuse,
    /// Always build a new connection.
    Fresh,
}

struct Connection {
    collection: Box<dyn StoreCollection>,
    _session: Box<dyn StoreSession>,
}

/// Owns the worker's lazily established connection.
pub struct ConnectionManager {
    client: Box<dyn StoreClient>,
    target: StoreTarget,
    connection: Option<Connection>,
    connects: u64,
}

impl ConnectionManager {
    pub fn new(client: Box<dyn StoreClient>, target: StoreTarget) -> Self {
        Self {
            client,
            target,
            connection: None,
            connects: 0,
        }
    }

    pub fn target(&self) -> &StoreTarget {
        &self.target
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Number of connections established so far.
    pub fn connect_count(&self) -> u64 {
        self.connects
    }

    /// Makes sure a client and a resolved collection handle exist.
    ///
    /// A connection is only kept when both steps succeed.
    pub fn ensure_connected(&mut self, mode: ConnectMode) -> Result<(), StoreError> {
        if mode == ConnectMode::Reuse && self.connection.is_some() {
            return Ok(());
        }
        self.connection = None;

        let session = self.client.connect(self.target.uri.as_str()).map_err(|e| {
            error!(uri = %self.target.uri, reason = %e, "Error connecting to MongoDB");
            e
        })?;

        let collection = session
            .collection(self.target.database(), &self.target.collection)
            .map_err(|e| {
                error!(
                    database = self.target.database(),
                    collection = %self.target.collection,
                    reason = %e,
                    "Error getting specified MongoDB collection"
                );
                e
            })?;

        self.connects += 1;
        debug!(
            database = self.target.database(),
            collection = %self.target.collection,
            "Connected to MongoDB"
        );
        self.connection = Some(Connection {
            collection,
            _session: session,
        });
        Ok(())
    }

    pub fn collection(&self) -> Option<&dyn StoreCollection> {
        self.connection
            .as_ref()
            .map(|connection| connection.collection.as_ref())
    }

    /// Releases the client. Safe to call when already disconnected.
    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            debug!(collection = %self.target.collection, "Disconnected from MongoDB");
        }
    }
}
