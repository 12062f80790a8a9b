use crate::document::DocumentError;
use crate::store::StoreError;
use std::fmt;

/// Result of one insert attempt, as seen by the retry scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Success,
    /// The record can never be stored. Not retried.
    Drop,
    /// The attempt failed but the connection is still believed usable.
    Error(String),
    /// The connection is gone and must be rebuilt before the next attempt.
    NotConnected(String),
}

impl InsertOutcome {
    pub fn is_retryable(&self) -> bool {
        matches!(self, InsertOutcome::Error(_) | InsertOutcome::NotConnected(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            InsertOutcome::Error(reason) | InsertOutcome::NotConnected(reason) => Some(reason),
            InsertOutcome::Success | InsertOutcome::Drop => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InsertOutcome::Success => "success",
            InsertOutcome::Drop => "drop",
            InsertOutcome::Error(_) => "error",
            InsertOutcome::NotConnected(_) => "not_connected",
        }
    }
}

impl fmt::Display for InsertOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{}: {}", self.as_str(), reason),
            None => f.write_str(self.as_str()),
        }
    }
}

/// Outcome when no usable connection could be established.
pub fn classify_connect_error(error: &StoreError) -> InsertOutcome {
    InsertOutcome::NotConnected(error.to_string())
}

/// Malformed records are dropped, never retried.
pub fn classify_build_error(_error: &DocumentError) -> InsertOutcome {
    InsertOutcome::Drop
}

pub fn classify_insert(result: Result<(), StoreError>) -> InsertOutcome {
    match result {
        Ok(()) => InsertOutcome::Success,
        Err(e) if e.is_connection_lost() => InsertOutcome::NotConnected(e.to_string()),
        Err(e) => InsertOutcome::Error(e.to_string()),
    }
}
