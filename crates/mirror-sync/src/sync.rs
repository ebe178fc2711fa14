//! # Sync Reconciler
//!
//! One pass brings the two copies of one resource into agreement:
//!
//! 1. Resolve the consumer namespace for the provider namespace in the key.
//! 2. Fetch both copies; a missing copy is recorded as absent.
//! 3. Decide the owner ([`resolve_owner`]).
//! 4. Converge the non-owning side onto the owning one.
//!
//! Step 4 issues at most one write per side. Every write is gated on an equality check against
//! the copy just fetched, so a second pass over unchanged copies writes nothing.
//!
//! The owning side's copy is tagged in place before anything is mirrored. No tag is ever
//! replaced with a different value: when the mirror is already tagged for the other side the
//! pass is skipped.

use crate::candidate::{build_candidate, rebase_onto};
use crate::error::{Mutation, Outcome, ReconcileError, SkipReason};
use crate::mapping::NamespaceMapper;
use crate::ownership::resolve_owner;
use crate::queue::Reconcile;
use crate::resource::{ObjectKey, Owner, Resource};
use crate::store::{checkpoint, MappingStore, ObjectStore, Sides};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Bidirectional ownership-arbitrating mirror for one resource kind.
pub struct SyncReconciler<P, C, M> {
    sides: Sides<P, C>,
    mapper: NamespaceMapper<M>,
}

impl<P, C, M> SyncReconciler<P, C, M>
where
    P: ObjectStore,
    C: ObjectStore,
    M: MappingStore,
{
    pub fn new(provider: P, consumer: C, mapper: NamespaceMapper<M>) -> Self {
        Self {
            sides: Sides::new(provider, consumer),
            mapper,
        }
    }

    /// Runs one pass for the resource addressed by its provider-side `key`.
    ///
    /// An empty namespace in `key` means the resource is cluster-scoped on both sides.
    #[instrument(name = "sync_pass", skip(self, cancel), fields(key = %key))]
    pub async fn reconcile(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<Outcome, ReconcileError> {
        checkpoint(cancel)?;
        let consumer_namespace = self.mapper.resolve(&key.namespace).await?;
        let provider_key = key.clone();
        let consumer_key = key.in_namespace(consumer_namespace);

        let provider = self.sides.fetch(Owner::Provider, &provider_key, cancel).await?;
        let consumer = self.sides.fetch(Owner::Consumer, &consumer_key, cancel).await?;

        if provider.is_none() && consumer.is_none() {
            debug!("No copy on either side");
            return Ok(Outcome::Skipped(SkipReason::Absent));
        }

        let owner = match resolve_owner(provider.as_ref(), consumer.as_ref()) {
            Ok(owner) => owner,
            Err(e) => {
                warn!(error = %e, "Skipping until one copy is tagged");
                return Ok(Outcome::Skipped(SkipReason::Indeterminate));
            }
        };

        let (owned, mirror, mirror_key) = match owner {
            Owner::Provider => (provider, consumer, consumer_key),
            Owner::Consumer => (consumer, provider, provider_key),
        };

        // Converging would replace the mirror's own owner tag.
        if let Some(mirror_tag) = mirror.as_ref().and_then(Resource::owner) {
            if mirror_tag != owner {
                warn!(
                    owner = owner.as_tag(),
                    mirror_tag = mirror_tag.as_tag(),
                    "Mirror is tagged for the other side"
                );
                return Ok(Outcome::Skipped(SkipReason::ConflictingTags));
            }
        }

        let mut mutations = Vec::new();
        self.converge(owner, owned, mirror, &mirror_key, &mut mutations, cancel)
            .await?;

        if mutations.is_empty() {
            debug!(owner = owner.as_tag(), "In sync");
        } else {
            info!(owner = owner.as_tag(), ?mutations, "Synced");
        }
        Ok(Outcome::Synced {
            owner: Some(owner),
            mutations,
        })
    }

    async fn converge(
        &self,
        owner: Owner,
        owned: Option<Resource>,
        mirror: Option<Resource>,
        mirror_key: &ObjectKey,
        mutations: &mut Vec<Mutation>,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        let mirror_side = owner.opposite();

        let Some(mut owned) = owned else {
            // The owner's copy is gone, so the mirror goes too.
            if self.sides.delete(mirror_side, mirror_key, cancel).await? {
                mutations.push(Mutation::Deleted(mirror_side));
            }
            return Ok(());
        };

        if owned.owner().is_none() {
            let mut tagged = owned.clone();
            tagged.set_owner(owner);
            if tagged != owned {
                owned = self.sides.update(owner, tagged, cancel).await?;
                mutations.push(Mutation::Tagged(owner));
            }
        }

        let Some(mirror) = mirror else {
            if owned.is_terminating() {
                debug!("Owner copy is terminating; nothing to mirror");
                return Ok(());
            }
            let candidate = desired_mirror(&owned, owner, &mirror_key.namespace);
            self.sides.create(mirror_side, candidate, cancel).await?;
            mutations.push(Mutation::Created(mirror_side));
            return Ok(());
        };

        if owned.is_terminating() {
            if self.sides.delete(mirror_side, mirror_key, cancel).await? {
                mutations.push(Mutation::Deleted(mirror_side));
            }
            return Ok(());
        }

        let mut candidate = desired_mirror(&owned, owner, &mirror_key.namespace);
        if mirror.is_bound() {
            candidate.set_bound();
        }
        if candidate.same_content(&mirror) {
            return Ok(());
        }
        self.sides
            .update(mirror_side, rebase_onto(candidate, &mirror), cancel)
            .await?;
        mutations.push(Mutation::Updated(mirror_side));
        Ok(())
    }
}

/// The mirror's desired state: the owner's copy, sanitised and tagged with the owner.
fn desired_mirror(owned: &Resource, owner: Owner, namespace: &str) -> Resource {
    let mut candidate = build_candidate(owned, namespace);
    candidate.set_owner(owner);
    candidate
}

#[async_trait]
impl<P, C, M> Reconcile for SyncReconciler<P, C, M>
where
    P: ObjectStore + 'static,
    C: ObjectStore + 'static,
    M: MappingStore + 'static,
{
    async fn reconcile(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<Outcome, ReconcileError> {
        SyncReconciler::reconcile(self, key, cancel).await
    }
}
