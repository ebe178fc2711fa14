//! Ownership arbitration between the two copies of a resource.

use crate::resource::{Owner, Resource, Side};

/// Neither copy settles who owns the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("owner cannot be determined from the observed copies")]
pub struct IndeterminateOwner;

/// Decides which side's copy is authoritative.
///
/// A tag already on the provider copy wins, then a tag on the consumer copy. An untagged copy
/// owns the resource only when the other side has no copy at all (first seen wins). Both
/// copies present and untagged, or both absent, is indeterminate.
pub fn resolve_owner(
    provider: Option<&Resource>,
    consumer: Option<&Resource>,
) -> Result<Owner, IndeterminateOwner> {
    if let Some(owner) = provider.and_then(Resource::owner) {
        return Ok(owner);
    }
    if provider.is_some() && consumer.is_none() {
        return Ok(Side::Provider);
    }
    if let Some(owner) = consumer.and_then(Resource::owner) {
        return Ok(owner);
    }
    if consumer.is_some() && provider.is_none() {
        return Ok(Side::Consumer);
    }
    Err(IndeterminateOwner)
}
