//! Candidate construction: the desired shape of a copy on the opposite side.

use crate::resource::Resource;

/// Builds a copy of `source` that the opposite store accepts as a fresh write.
///
/// Cleared: identity, resource version, creation time, managed-field provenance, deletion
/// marker and grace period, owner references. The namespace is set to `target_namespace`.
/// Kind, labels, annotations and payload are kept as they are.
pub fn build_candidate(source: &Resource, target_namespace: &str) -> Resource {
    let mut candidate = source.clone();
    let meta = &mut candidate.metadata;
    meta.namespace = target_namespace.to_string();
    meta.uid = None;
    meta.resource_version = None;
    meta.creation_timestamp = None;
    meta.managed_fields.clear();
    meta.deletion_timestamp = None;
    meta.deletion_grace_period_seconds = None;
    meta.owner_references.clear();
    candidate
}

/// Moves `candidate` onto the identity of `existing` so the write replaces that copy in place.
///
/// The resource version is carried over and acts as the optimistic concurrency token.
pub fn rebase_onto(mut candidate: Resource, existing: &Resource) -> Resource {
    candidate.metadata.uid = existing.metadata.uid.clone();
    candidate.metadata.resource_version = existing.metadata.resource_version.clone();
    candidate.metadata.creation_timestamp = existing.metadata.creation_timestamp;
    candidate
}
