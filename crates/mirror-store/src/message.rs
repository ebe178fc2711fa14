//! # Store Messages
//!
//! This module defines the request and event types exchanged between a
//! [`StoreClient`](crate::StoreClient) and its [`StoreActor`](crate::StoreActor).

use crate::entity::StoreEntity;
use crate::error::StoreError;
use std::fmt;
use tokio::sync::oneshot;

/// Type alias for the one-shot response channel used by stores.
pub type Response<T> = oneshot::Sender<Result<T, StoreError>>;

/// Internal message type sent to the store to request operations.
///
/// The variants map directly to the operations a store adapter offers: read one record, read
/// all records, and the three mutations. Writes carry the full record; the key is derived from
/// it through [`StoreEntity::key`].
#[derive(Debug)]
pub enum StoreRequest<T: StoreEntity> {
    Get {
        key: T::Key,
        respond_to: Response<T>,
    },
    List {
        respond_to: Response<Vec<T>>,
    },
    Create {
        item: T,
        respond_to: Response<T>,
    },
    Update {
        item: T,
        respond_to: Response<T>,
    },
    Delete {
        key: T::Key,
        respond_to: Response<()>,
    },
}

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Created => "created",
            EventKind::Updated => "updated",
            EventKind::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Change notification published after every successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent<K> {
    pub kind: EventKind,
    pub key: K,
}
