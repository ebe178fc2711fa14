//! # Namespace Mapping
//!
//! A provider namespace corresponds to exactly one consumer namespace. The correspondence is
//! recorded in a [`NamespaceMapping`] created by someone else; the record can exist before its
//! target namespace is filled in.

use crate::error::{ReconcileError, StoreOp};
use crate::store::MappingStore;
use mirror_store::StoreEntity;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Per-provider-namespace record naming the matching consumer namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceMapping {
    pub provider_namespace: String,
    /// Empty until the target namespace is provisioned.
    #[serde(default)]
    pub consumer_namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
}

impl NamespaceMapping {
    pub fn new(provider_namespace: impl Into<String>, consumer_namespace: impl Into<String>) -> Self {
        Self {
            provider_namespace: provider_namespace.into(),
            consumer_namespace: consumer_namespace.into(),
            resource_version: None,
        }
    }

    /// A mapping whose target has not been populated yet.
    pub fn pending(provider_namespace: impl Into<String>) -> Self {
        Self::new(provider_namespace, "")
    }

    pub fn is_ready(&self) -> bool {
        !self.consumer_namespace.is_empty()
    }
}

impl StoreEntity for NamespaceMapping {
    type Key = String;

    fn key(&self) -> String {
        self.provider_namespace.clone()
    }

    fn resource_version(&self) -> Option<&str> {
        self.resource_version.as_deref()
    }

    fn set_resource_version(&mut self, version: String) {
        self.resource_version = Some(version);
    }
}

/// Resolves namespaces across the two sides through a [`MappingStore`].
#[derive(Clone)]
pub struct NamespaceMapper<M> {
    store: M,
}

impl<M: MappingStore> NamespaceMapper<M> {
    pub fn new(store: M) -> Self {
        Self { store }
    }

    /// Consumer namespace for `provider_namespace`.
    ///
    /// The empty namespace (cluster scope) maps to itself without a lookup. A missing record
    /// or an unpopulated one is a retryable failure.
    pub async fn resolve(&self, provider_namespace: &str) -> Result<String, ReconcileError> {
        if provider_namespace.is_empty() {
            return Ok(String::new());
        }
        let mapping = self.store.get(provider_namespace).await.map_err(|e| {
            if e.is_not_found() {
                ReconcileError::MappingNotFound(provider_namespace.to_string())
            } else {
                ReconcileError::mapping(StoreOp::Get, e)
            }
        })?;
        if !mapping.is_ready() {
            return Err(ReconcileError::MappingNotReady(provider_namespace.to_string()));
        }
        debug!(provider_namespace, consumer_namespace = %mapping.consumer_namespace, "Resolved namespace");
        Ok(mapping.consumer_namespace)
    }

    /// Provider namespace whose mapping points at `consumer_namespace`, if any.
    pub async fn reverse(&self, consumer_namespace: &str) -> Result<Option<String>, ReconcileError> {
        if consumer_namespace.is_empty() {
            return Ok(Some(String::new()));
        }
        let mappings = self
            .store
            .list()
            .await
            .map_err(|e| ReconcileError::mapping(StoreOp::List, e))?;
        Ok(mappings
            .into_iter()
            .find(|m| m.is_ready() && m.consumer_namespace == consumer_namespace)
            .map(|m| m.provider_namespace))
    }
}
