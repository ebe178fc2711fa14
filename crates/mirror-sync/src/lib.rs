//! # Mirror Sync
//!
//! Mirrors individual resources between a **provider** store and a **consumer** store. One copy
//! is authoritative; its state is propagated to the other side, and either side may originate
//! a resource.
//!
//! ## Core Components
//!
//! - **[resource]**: the [`Resource`] value type and the reserved owner/bound annotations.
//! - **[ownership]**: decides which side owns a resource ([`resolve_owner`]).
//! - **[candidate]**: sanitizes a copy for writing to the opposite side ([`build_candidate`]).
//! - **[mapping]**: provider-to-consumer namespace resolution ([`NamespaceMapper`]).
//! - **[sync]**: bidirectional reconciliation ([`SyncReconciler`]).
//! - **[adopt]**: one-way claiming of provider-side resources ([`AdoptionReconciler`]).
//! - **[store]**: the capability traits the reconcilers call ([`ObjectStore`], [`MappingStore`]).
//! - **[queue]**: keyed single-flight delivery with retry ([`WorkQueue`]).
//! - **[lifecycle]**: starts and stops the whole runtime ([`MirrorSystem`]).
//!
//! ## Pass Results
//!
//! A pass returns `Ok(Outcome::Synced { .. })`, `Ok(Outcome::Skipped(..))` for "nothing to do",
//! or an `Err(ReconcileError)` the queue redelivers with backoff.
//!
//! ## Testing
//!
//! Reconcilers take any [`ObjectStore`], so unit tests drive them with
//! [`MockStore`](mirror_store::mock::MockStore) clients and check the exact calls made.

pub mod adopt;
pub mod candidate;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod mapping;
pub mod ownership;
pub mod queue;
pub mod resource;
pub mod store;
pub mod sync;

pub use adopt::AdoptionReconciler;
pub use candidate::build_candidate;
pub use config::{ConfigError, MirrorConfig, Mode};
pub use error::{Mutation, Outcome, ReconcileError, SkipReason};
pub use lifecycle::MirrorSystem;
pub use mapping::{NamespaceMapper, NamespaceMapping};
pub use ownership::{resolve_owner, IndeterminateOwner};
pub use queue::{Reconcile, RetryPolicy, WorkQueue};
pub use resource::{ObjectKey, Owner, Resource, Side};
pub use store::{MappingStore, ObjectStore};
pub use sync::SyncReconciler;
