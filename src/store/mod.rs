//! Remote document store access.
//!
//! The delivery path only sees the three traits below. `mongo` adapts the
//! MongoDB driver to them; tests plug in fakes.

pub mod connection;
pub mod mongo;
pub mod uri;

pub use connection::{ConnectMode, ConnectionManager, StoreTarget};
pub use mongo::{ConnectionLossClassifier, MongoStore};
pub use uri::{StoreUri, UriError};

use bson::Document;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Collection unavailable: {0}")]
    CollectionUnavailable(String),
    #[error("Not connected: {0}")]
    NotConnected(String),
    #[error("Insert failed: {0}")]
    InsertFailed(String),
}

impl StoreError {
    /// True when the connection itself is unusable and must be rebuilt before
    /// the next attempt.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            StoreError::ConnectionFailed(_) | StoreError::NotConnected(_)
        )
    }
}

/// Entry point of a store client library.
#[cfg_attr(test, automock)]
pub trait StoreClient: Send {
    fn connect(&self, uri: &str) -> Result<Box<dyn StoreSession>, StoreError>;
}

/// An established client handle.
#[cfg_attr(test, automock)]
pub trait StoreSession: Send {
    fn collection(
        &self,
        database: &str,
        name: &str,
    ) -> Result<Box<dyn StoreCollection>, StoreError>;
}

/// A resolved collection handle.
#[cfg_attr(test, automock)]
pub trait StoreCollection: Send {
    fn insert(&self, document: &Document) -> Result<(), StoreError>;
}
