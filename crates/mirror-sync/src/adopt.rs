//! # Adoption Reconciler
//!
//! Claims resources first seen on the provider side and mirrors them one way. A claimed
//! resource carries [`BOUND_ANNOTATION`](crate::resource::BOUND_ANNOTATION) on both copies.
//!
//! The bound tag is never cleared here. Once the source is bound, a missing mirror is read as a
//! deliberate removal and is not recreated.

use crate::candidate::build_candidate;
use crate::error::{Mutation, Outcome, ReconcileError, SkipReason};
use crate::mapping::NamespaceMapper;
use crate::queue::Reconcile;
use crate::resource::{ObjectKey, Resource, Side};
use crate::store::{checkpoint, MappingStore, ObjectStore, Sides};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

const HOME: Side = Side::Provider;

pub struct AdoptionReconciler<P, C, M> {
    sides: Sides<P, C>,
    mapper: NamespaceMapper<M>,
}

impl<P, C, M> AdoptionReconciler<P, C, M>
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

    /// Runs one adoption pass for an observed provider-side copy.
    #[instrument(name = "adopt_pass", skip(self, source, cancel), fields(key = %source.key()))]
    pub async fn reconcile(
        &self,
        source: &Resource,
        cancel: &CancellationToken,
    ) -> Result<Outcome, ReconcileError> {
        let target = HOME.opposite();
        checkpoint(cancel)?;
        let target_namespace = self.mapper.resolve(&source.metadata.namespace).await?;
        let target_key = source.key().in_namespace(target_namespace);

        let mut mutations = Vec::new();
        match self.sides.fetch(target, &target_key, cancel).await? {
            None if source.is_bound() => {
                info!("Mirror removed after binding; not recreating");
                return Ok(Outcome::Skipped(SkipReason::AlreadyBound));
            }
            None => {
                let mut candidate = build_candidate(source, &target_key.namespace);
                candidate.clear_owner();
                candidate.set_bound();
                self.sides.create(target, candidate, cancel).await?;
                mutations.push(Mutation::Created(target));
            }
            Some(mirror) => {
                let mut bound_mirror = mirror.clone();
                bound_mirror.set_bound();
                if bound_mirror != mirror {
                    self.sides.update(target, bound_mirror, cancel).await?;
                    mutations.push(Mutation::Tagged(target));
                }

                let mut bound_source = source.clone();
                bound_source.set_bound();
                if bound_source != *source {
                    self.sides.update(HOME, bound_source, cancel).await?;
                    mutations.push(Mutation::Tagged(HOME));
                }
            }
        }

        if mutations.is_empty() {
            debug!("Already adopted");
        } else {
            info!(?mutations, "Adopted");
        }
        Ok(Outcome::Synced {
            owner: None,
            mutations,
        })
    }

    /// Fetches the provider-side copy under `key` and adopts it.
    pub async fn reconcile_key(
        &self,
        key: &ObjectKey,
        cancel: &CancellationToken,
    ) -> Result<Outcome, ReconcileError> {
        match self.sides.fetch(HOME, key, cancel).await? {
            Some(source) => self.reconcile(&source, cancel).await,
            None => {
                debug!(%key, "Nothing to adopt");
                Ok(Outcome::Skipped(SkipReason::NotObserved))
            }
        }
    }
}

#[async_trait]
impl<P, C, M> Reconcile for AdoptionReconciler<P, C, M>
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
        self.reconcile_key(key, cancel).await
    }
}
