use super::{StoreClient, StoreCollection, StoreError, StoreSession};
use bson::Document;
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::sync::{Client, Collection};

/// Decides whether a driver error means the connection is gone.
pub type ConnectionLossClassifier = fn(&MongoError) -> bool;

/// Network-level failures: the server could not be selected, the socket broke,
/// or the pool was cleared underneath us.
pub fn is_connection_loss(error: &MongoError) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Io(_) | ErrorKind::ServerSelection { .. } | ErrorKind::ConnectionPoolCleared { .. }
    )
}

/// [`StoreClient`] backed by the blocking MongoDB driver.
#[derive(Debug, Clone, Copy)]
pub struct MongoStore {
    classify: ConnectionLossClassifier,
}

impl Default for MongoStore {
    fn default() -> Self {
        Self {
            classify: is_connection_loss,
        }
    }
}

impl MongoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the rule that maps insert errors to "not connected".
    pub fn with_classifier(classify: ConnectionLossClassifier) -> Self {
        Self { classify }
    }
}

impl StoreClient for MongoStore {
    fn connect(&self, uri: &str) -> Result<Box<dyn StoreSession>, StoreError> {
        let client =
            Client::with_uri_str(uri).map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        Ok(Box::new(MongoSession {
            client,
            classify: self.classify,
        }))
    }
}

struct MongoSession {
    client: Client,
    classify: ConnectionLossClassifier,
}

impl StoreSession for MongoSession {
    fn collection(
        &self,
        database: &str,
        name: &str,
    ) -> Result<Box<dyn StoreCollection>, StoreError> {
        validate_collection_name(name)?;

        let collection = self.client.database(database).collection::<Document>(name);
        Ok(Box::new(MongoCollection {
            collection,
            classify: self.classify,
        }))
    }
}

struct MongoCollection {
    collection: Collection<Document>,
    classify: ConnectionLossClassifier,
}

impl StoreCollection for MongoCollection {
    fn insert(&self, document: &Document) -> Result<(), StoreError> {
        self.collection
            .insert_one(document)
            .run()
            .map(|_| ())
            .map_err(|e| {
                if (self.classify)(&e) {
                    StoreError::NotConnected(e.to_string())
                } else {
                    StoreError::InsertFailed(e.to_string())
                }
            })
    }
}

fn validate_collection_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() || name.contains('$') || name.contains('\0') || name.starts_with("system.")
    {
        return Err(StoreError::CollectionUnavailable(format!(
            "invalid collection name '{name}'"
        )));
    }
    Ok(())
}
