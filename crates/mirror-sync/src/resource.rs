//! # Resource Model
//!
//! Plain data describing one copy of a mirrored resource. Two independent copies exist, one per
//! [`Side`], correlated by mapped namespace and name.
//!
//! Ownership and adoption are signalled through two reserved annotation keys,
//! [`OWNER_ANNOTATION`] and [`BOUND_ANNOTATION`]. Their values round-trip exactly.

use chrono::{DateTime, Utc};
use mirror_store::StoreEntity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Annotation recording which side's copy is authoritative.
pub const OWNER_ANNOTATION: &str = "mirror.sync/owner";

/// Annotation recording that a resource was adopted into the mirrored set.
pub const BOUND_ANNOTATION: &str = "mirror.sync/bound";

/// The only value [`BOUND_ANNOTATION`] is ever set to.
pub const BOUND_VALUE: &str = "true";

/// One of the two stores a resource is mirrored between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Provider,
    Consumer,
}

/// The side whose copy is authoritative.
pub type Owner = Side;

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Provider => Side::Consumer,
            Side::Consumer => Side::Provider,
        }
    }

    /// Exact value written to [`OWNER_ANNOTATION`].
    pub fn as_tag(self) -> &'static str {
        match self {
            Side::Provider => "Provider",
            Side::Consumer => "Consumer",
        }
    }

    /// Parses an [`OWNER_ANNOTATION`] value. Anything but an exact match is `None`.
    pub fn from_tag(value: &str) -> Option<Side> {
        match value {
            "Provider" => Some(Side::Provider),
            "Consumer" => Some(Side::Consumer),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Provider => "provider",
            Side::Consumer => "consumer",
        })
    }
}

/// Address of a copy inside one store. An empty namespace means cluster scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Same name, different namespace.
    pub fn in_namespace(&self, namespace: impl Into<String>) -> Self {
        Self::new(namespace, self.name.clone())
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// Link from a copy to the object that controls its lifecycle on the same side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<bool>,
}

/// Which writer last touched which part of a copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedFieldsEntry {
    pub manager: String,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_grace_period_seconds: Option<i64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub managed_fields: Vec<ManagedFieldsEntry>,
}

/// One copy of a mirrored resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: String,
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Resource {
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            kind: kind.into(),
            metadata: ObjectMeta {
                name: name.into(),
                namespace: namespace.into(),
                ..ObjectMeta::default()
            },
            payload,
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.metadata.namespace.clone(), self.metadata.name.clone())
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata.annotations.get(key).map(String::as_str)
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    /// The recorded owner. Missing or unrecognised values read as untagged.
    pub fn owner(&self) -> Option<Owner> {
        self.annotation(OWNER_ANNOTATION).and_then(Side::from_tag)
    }

    pub fn set_owner(&mut self, owner: Owner) {
        self.metadata
            .annotations
            .insert(OWNER_ANNOTATION.to_string(), owner.as_tag().to_string());
    }

    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.set_owner(owner);
        self
    }

    pub fn clear_owner(&mut self) {
        self.metadata.annotations.remove(OWNER_ANNOTATION);
    }

    pub fn is_bound(&self) -> bool {
        self.annotation(BOUND_ANNOTATION) == Some(BOUND_VALUE)
    }

    pub fn set_bound(&mut self) {
        self.metadata
            .annotations
            .insert(BOUND_ANNOTATION.to_string(), BOUND_VALUE.to_string());
    }

    pub fn with_bound(mut self) -> Self {
        self.set_bound();
        self
    }

    /// `true` once the copy carries a deletion marker.
    pub fn is_terminating(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Compares what is mirrored: kind, labels, annotations and payload.
    ///
    /// Identity, version and lifecycle fields differ between the two sides by construction and
    /// are ignored.
    pub fn same_content(&self, other: &Resource) -> bool {
        self.kind == other.kind
            && self.metadata.labels == other.metadata.labels
            && self.metadata.annotations == other.metadata.annotations
            && self.payload == other.payload
    }
}

impl StoreEntity for Resource {
    type Key = ObjectKey;

    fn key(&self) -> ObjectKey {
        Resource::key(self)
    }

    fn resource_version(&self) -> Option<&str> {
        self.metadata.resource_version.as_deref()
    }

    fn set_resource_version(&mut self, version: String) {
        self.metadata.resource_version = Some(version);
    }

    fn on_create(&mut self, seq: u64) {
        self.metadata.uid = Some(format!("{:08x}-{}", seq, self.metadata.name));
        self.metadata.creation_timestamp.get_or_insert_with(Utc::now);
    }

    fn on_update(&mut self, previous: &Self) {
        self.metadata.uid = previous.metadata.uid.clone();
        self.metadata.creation_timestamp = previous.metadata.creation_timestamp;
    }
}
