//! # Store Adapters
//!
//! The reconcilers never talk to a concrete store. They hold one [`ObjectStore`] per side and
//! one [`MappingStore`], which lets tests swap in [`MockStore`](mirror_store::mock::MockStore)
//! clients or hand-written fakes.
//!
//! Both traits are implemented for the matching [`StoreClient`], so a running
//! [`StoreActor`](mirror_store::StoreActor) plugs in directly.

use crate::error::{ReconcileError, StoreOp};
use crate::mapping::NamespaceMapping;
use crate::resource::{ObjectKey, Resource, Side};
use async_trait::async_trait;
use mirror_store::{StoreClient, StoreError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// get/create/update/delete for the copies kept on one side.
///
/// Absence is reported as an error for which [`StoreError::is_not_found`] holds.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> Result<Resource, StoreError>;
    async fn create(&self, resource: Resource) -> Result<Resource, StoreError>;
    async fn update(&self, resource: Resource) -> Result<Resource, StoreError>;
    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError>;
}

/// Read access to namespace mapping records, keyed by provider namespace.
#[async_trait]
pub trait MappingStore: Send + Sync {
    async fn get(&self, provider_namespace: &str) -> Result<NamespaceMapping, StoreError>;
    async fn list(&self) -> Result<Vec<NamespaceMapping>, StoreError>;
}

#[async_trait]
impl ObjectStore for StoreClient<Resource> {
    async fn get(&self, key: &ObjectKey) -> Result<Resource, StoreError> {
        StoreClient::get(self, key.clone()).await
    }

    async fn create(&self, resource: Resource) -> Result<Resource, StoreError> {
        StoreClient::create(self, resource).await
    }

    async fn update(&self, resource: Resource) -> Result<Resource, StoreError> {
        StoreClient::update(self, resource).await
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        StoreClient::delete(self, key.clone()).await
    }
}

#[async_trait]
impl MappingStore for StoreClient<NamespaceMapping> {
    async fn get(&self, provider_namespace: &str) -> Result<NamespaceMapping, StoreError> {
        StoreClient::get(self, provider_namespace.to_string()).await
    }

    async fn list(&self) -> Result<Vec<NamespaceMapping>, StoreError> {
        StoreClient::list(self).await
    }
}

/// The two sides of the mirror, with side-labelled errors and cancellation checks.
///
/// Every call first checks `cancel`, so a cancelled pass stops before its next store call.
pub(crate) struct Sides<P, C> {
    provider: P,
    consumer: C,
}

impl<P: ObjectStore, C: ObjectStore> Sides<P, C> {
    pub(crate) fn new(provider: P, consumer: C) -> Self {
        Self { provider, consumer }
    }

    fn store(&self, side: Side) -> &dyn ObjectStore {
        match side {
            Side::Provider => &self.provider,
            Side::Consumer => &self.consumer,
        }
    }

    /// `None` when the side has no copy under `key`.
    pub(crate) async fn fetch(
        &self,
        side: Side,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<Option<Resource>, ReconcileError> {
        checkpoint(cancel)?;
        match self.store(side).get(key).await {
            Ok(resource) => Ok(Some(resource)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(ReconcileError::store(side, StoreOp::Get, e)),
        }
    }

    pub(crate) async fn create(
        &self,
        side: Side,
        resource: Resource,
        cancel: &CancellationToken,
    ) -> Result<Resource, ReconcileError> {
        checkpoint(cancel)?;
        let key = resource.key();
        let created = self
            .store(side)
            .create(resource)
            .await
            .map_err(|e| ReconcileError::store(side, StoreOp::Create, e))?;
        info!(%side, %key, "Created copy");
        Ok(created)
    }

    pub(crate) async fn update(
        &self,
        side: Side,
        resource: Resource,
        cancel: &CancellationToken,
    ) -> Result<Resource, ReconcileError> {
        checkpoint(cancel)?;
        let key = resource.key();
        let updated = self
            .store(side)
            .update(resource)
            .await
            .map_err(|e| ReconcileError::store(side, StoreOp::Update, e))?;
        info!(%side, %key, "Updated copy");
        Ok(updated)
    }

    /// Deletes the copy under `key`. Returns `false` if it was already gone.
    pub(crate) async fn delete(
        &self,
        side: Side,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<bool, ReconcileError> {
        checkpoint(cancel)?;
        match self.store(side).delete(key).await {
            Ok(()) => {
                info!(%side, %key, "Deleted copy");
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                debug!(%side, %key, "Copy already gone");
                Ok(false)
            }
            Err(e) => Err(ReconcileError::store(side, StoreOp::Delete, e)),
        }
    }
}

pub(crate) fn checkpoint(cancel: &CancellationToken) -> Result<(), ReconcileError> {
    if cancel.is_cancelled() {
        return Err(ReconcileError::Cancelled);
    }
    Ok(())
}
