//! # StoreEntity Trait
//!
//! The `StoreEntity` trait is the contract every record kept by a [`StoreActor`](crate::StoreActor)
//! must satisfy. It names the key a record is addressed by and exposes the optimistic
//! concurrency token the store stamps on every successful write.
//!
//! # Architecture Note
//! The store itself knows nothing about resources, namespaces or ownership tags. By keeping the
//! contract this small, the same actor serves mirrored resources on both sides *and* the
//! namespace mapping records, and the compiler keeps the three stores from being mixed up.
//!
//! # Provided Methods (Hooks)
//! - [`StoreEntity::on_create`] is called once, right before the record is first inserted.
//! - [`StoreEntity::on_update`] is called before a record replaces its previous version.
//!
//! The default implementations do nothing.

use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Trait that any record must implement to be kept by a `StoreActor`.
pub trait StoreEntity: Clone + Debug + Send + Sync + 'static {
    /// The address of a record inside one store (e.g. `namespace/name`).
    type Key: Eq + Hash + Clone + Send + Sync + Display + Debug;

    /// Returns the key this record is stored under.
    fn key(&self) -> Self::Key;

    /// The optimistic concurrency token, or `None` if the record was never written.
    fn resource_version(&self) -> Option<&str>;

    /// Replaces the optimistic concurrency token. Only the store calls this.
    fn set_resource_version(&mut self, version: String);

    /// Called immediately before a record is first inserted.
    ///
    /// `seq` is unique for the lifetime of the store and can be used to stamp identity.
    fn on_create(&mut self, _seq: u64) {}

    /// Called immediately before this record replaces `previous`.
    ///
    /// Use it to carry fields the writer is not allowed to change (identity, creation time).
    fn on_update(&mut self, _previous: &Self) {}
}
