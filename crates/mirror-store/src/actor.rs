//! # Store Actor
//!
//! This module defines the `StoreActor`, the in-memory object store that sits behind one side
//! of the mirror. It implements the "Server" side of the Actor Model, processing requests
//! sequentially and ensuring exclusive access to its records.

use crate::client::StoreClient;
use crate::entity::StoreEntity;
use crate::error::StoreError;
use crate::message::{EventKind, StoreEvent, StoreRequest};
use std::collections::HashMap;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 256;

/// The generic actor that owns a collection of records.
///
/// # Architecture Note
/// This struct is the "Server" half of the store. It owns the records and the receiver end of
/// the channel. Each store processes its own requests *sequentially*, so the map needs no
/// `Mutex`; two stores run fully in parallel.
///
/// # Write Semantics
///
/// * **Create**: fails with [`StoreError::AlreadyExists`] if the key is taken. Otherwise calls
///   [`StoreEntity::on_create`], stamps a fresh resource version and inserts the record.
/// * **Update**: fails with [`StoreError::NotFound`] if the key is missing and with
///   [`StoreError::Conflict`] if the submitted resource version is set and stale. Otherwise
///   calls [`StoreEntity::on_update`] and stamps a fresh version. Identical content still
///   produces a new version; detecting no-op writes is the caller's job.
/// * **Delete**: fails with [`StoreError::NotFound`] if the key is missing.
///
/// Every successful mutation publishes a [`StoreEvent`].
pub struct StoreActor<T: StoreEntity> {
    receiver: mpsc::Receiver<StoreRequest<T>>,
    events: broadcast::Sender<StoreEvent<T::Key>>,
    store: HashMap<T::Key, T>,
    next_seq: u64,
    next_version: u64,
}

impl<T: StoreEntity> StoreActor<T> {
    /// Creates a new `StoreActor` and its associated `StoreClient`.
    ///
    /// `buffer_size` is the capacity of the request channel. If the channel is full,
    /// calls to the client wait until there is space.
    pub fn new(buffer_size: usize) -> (Self, StoreClient<T>) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let actor = Self {
            receiver,
            events: events.clone(),
            store: HashMap::new(),
            next_seq: 1,
            next_version: 1,
        };
        let client = StoreClient::new(sender, events);
        (actor, client)
    }

    /// Seeds a record before the actor starts, bypassing events.
    pub fn with_record(mut self, mut item: T) -> Self {
        item.on_create(self.next_seq);
        self.next_seq += 1;
        let version = self.bump_version();
        item.set_resource_version(version);
        self.store.insert(item.key(), item);
        self
    }

    fn bump_version(&mut self) -> String {
        let version = self.next_version.to_string();
        self.next_version += 1;
        version
    }

    fn publish(&self, kind: EventKind, key: T::Key) {
        // No subscribers is fine.
        let _ = self.events.send(StoreEvent { kind, key });
    }

    /// Runs the actor's event loop, processing requests until every client is dropped.
    pub async fn run(mut self) {
        // Extract just the type name (e.g., "Resource" instead of "mirror_sync::resource::Resource")
        let entity_type = std::any::type_name::<T>()
            .split("::")
            .last()
            .unwrap_or("Unknown");
        info!(entity_type, size = self.store.len(), "Store started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                StoreRequest::Get { key, respond_to } => {
                    let result = self
                        .store
                        .get(&key)
                        .cloned()
                        .ok_or_else(|| StoreError::NotFound(key.to_string()));
                    debug!(entity_type, %key, found = result.is_ok(), "Get");
                    let _ = respond_to.send(result);
                }
                StoreRequest::List { respond_to } => {
                    let items: Vec<T> = self.store.values().cloned().collect();
                    debug!(entity_type, count = items.len(), "List");
                    let _ = respond_to.send(Ok(items));
                }
                StoreRequest::Create { mut item, respond_to } => {
                    let key = item.key();
                    debug!(entity_type, %key, ?item, "Create");
                    if self.store.contains_key(&key) {
                        warn!(entity_type, %key, "Already exists");
                        let _ = respond_to.send(Err(StoreError::AlreadyExists(key.to_string())));
                        continue;
                    }
                    item.on_create(self.next_seq);
                    self.next_seq += 1;
                    let version = self.bump_version();
                    item.set_resource_version(version);
                    self.store.insert(key.clone(), item.clone());
                    info!(entity_type, %key, size = self.store.len(), "Created");
                    self.publish(EventKind::Created, key);
                    let _ = respond_to.send(Ok(item));
                }
                StoreRequest::Update { mut item, respond_to } => {
                    let key = item.key();
                    debug!(entity_type, %key, ?item, "Update");
                    let Some(current) = self.store.get(&key) else {
                        warn!(entity_type, %key, "Not found");
                        let _ = respond_to.send(Err(StoreError::NotFound(key.to_string())));
                        continue;
                    };
                    let actual = current.resource_version().unwrap_or_default().to_string();
                    if let Some(expected) = item.resource_version() {
                        if expected != actual {
                            warn!(entity_type, %key, expected, %actual, "Version conflict");
                            let _ = respond_to.send(Err(StoreError::Conflict {
                                key: key.to_string(),
                                expected: expected.to_string(),
                                actual,
                            }));
                            continue;
                        }
                    }
                    item.on_update(current);
                    let version = self.bump_version();
                    item.set_resource_version(version);
                    self.store.insert(key.clone(), item.clone());
                    info!(entity_type, %key, "Updated");
                    self.publish(EventKind::Updated, key);
                    let _ = respond_to.send(Ok(item));
                }
                StoreRequest::Delete { key, respond_to } => {
                    debug!(entity_type, %key, "Delete");
                    if self.store.remove(&key).is_some() {
                        info!(entity_type, %key, size = self.store.len(), "Deleted");
                        self.publish(EventKind::Deleted, key);
                        let _ = respond_to.send(Ok(()));
                    } else {
                        warn!(entity_type, %key, "Not found");
                        let _ = respond_to.send(Err(StoreError::NotFound(key.to_string())));
                    }
                }
            }
        }

        info!(entity_type, size = self.store.len(), "Shutdown");
    }
}
