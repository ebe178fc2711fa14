//! # Store Client
//!
//! This module defines the typed client for communicating with a store actor.

use crate::entity::StoreEntity;
use crate::error::StoreError;
use crate::message::{StoreEvent, StoreRequest};
use tokio::sync::{broadcast, mpsc, oneshot};

/// ## StoreClient
///
/// The `StoreClient<T>` provides a type-safe, async API for interacting with a `StoreActor<T>`.
/// It forwards requests over a Tokio mpsc channel and returns results via oneshot channels.
///
/// * **Cloneable** – holds only senders, so cloning is inexpensive.
/// * **Async API** – every method resolves to `Result<…, StoreError>`.
/// * **Observable** – [`StoreClient::subscribe`] hands out a receiver of change events.
pub struct StoreClient<T: StoreEntity> {
    sender: mpsc::Sender<StoreRequest<T>>,
    events: broadcast::Sender<StoreEvent<T::Key>>,
}

impl<T: StoreEntity> Clone for StoreClient<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            events: self.events.clone(),
        }
    }
}

impl<T: StoreEntity> StoreClient<T> {
    pub fn new(
        sender: mpsc::Sender<StoreRequest<T>>,
        events: broadcast::Sender<StoreEvent<T::Key>>,
    ) -> Self {
        Self { sender, events }
    }

    /// Subscribes to change events published after each successful mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent<T::Key>> {
        self.events.subscribe()
    }

    pub async fn get(&self, key: T::Key) -> Result<T, StoreError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(StoreRequest::Get { key, respond_to })
            .await
            .map_err(|_| StoreError::ActorClosed)?;
        response.await.map_err(|_| StoreError::ActorDropped)?
    }

    pub async fn list(&self) -> Result<Vec<T>, StoreError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(StoreRequest::List { respond_to })
            .await
            .map_err(|_| StoreError::ActorClosed)?;
        response.await.map_err(|_| StoreError::ActorDropped)?
    }

    pub async fn create(&self, item: T) -> Result<T, StoreError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(StoreRequest::Create { item, respond_to })
            .await
            .map_err(|_| StoreError::ActorClosed)?;
        response.await.map_err(|_| StoreError::ActorDropped)?
    }

    pub async fn update(&self, item: T) -> Result<T, StoreError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(StoreRequest::Update { item, respond_to })
            .await
            .map_err(|_| StoreError::ActorClosed)?;
        response.await.map_err(|_| StoreError::ActorDropped)?
    }

    pub async fn delete(&self, key: T::Key) -> Result<(), StoreError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(StoreRequest::Delete { key, respond_to })
            .await
            .map_err(|_| StoreError::ActorClosed)?;
        response.await.map_err(|_| StoreError::ActorDropped)?
    }
}
