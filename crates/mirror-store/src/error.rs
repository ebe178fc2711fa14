//! # Store Errors
//!
//! This module defines the error type returned by every store operation. Callers are expected
//! to tell "the record is not there" apart from every other failure, so absence gets its own
//! variant and a classifier ([`StoreError::is_not_found`]).

/// Errors that can occur while talking to a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store closed")]
    ActorClosed,
    #[error("Store dropped response channel")]
    ActorDropped,
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Item already exists: {0}")]
    AlreadyExists(String),
    #[error("Version conflict on {key}: expected {expected}, found {actual}")]
    Conflict {
        key: String,
        expected: String,
        actual: String,
    },
    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns `true` when the error only means the addressed record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
