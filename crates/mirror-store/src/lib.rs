//! # Mirror Store
//!
//! This crate provides the object stores that sit on either side of the mirror. Each store is
//! an actor: one Tokio task owns the records and processes requests sequentially, and any
//! number of cheap, cloneable clients talk to it over a channel.
//!
//! ## Architecture Overview
//!
//! 1. **Record Layer** ([`StoreEntity`]) - what a record is keyed by and how it is versioned
//! 2. **Runtime Layer** ([`StoreActor`]) - request processing, versioning, change events
//! 3. **Interface Layer** ([`StoreClient`]) - type-safe async access
//!
//! ## Store Semantics
//!
//! - Reads and deletes of a missing key fail with [`StoreError::NotFound`].
//! - Creates of a taken key fail with [`StoreError::AlreadyExists`].
//! - Updates carrying a stale resource version fail with [`StoreError::Conflict`].
//! - Every successful mutation publishes a [`StoreEvent`] to subscribers.
//!
//! ```rust
//! use mirror_store::{StoreActor, StoreEntity};
//!
//! #[derive(Clone, Debug)]
//! struct Note { name: String, version: Option<String> }
//!
//! impl StoreEntity for Note {
//!     type Key = String;
//!     fn key(&self) -> String { self.name.clone() }
//!     fn resource_version(&self) -> Option<&str> { self.version.as_deref() }
//!     fn set_resource_version(&mut self, v: String) { self.version = Some(v); }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let (actor, client) = StoreActor::<Note>::new(10);
//!     tokio::spawn(actor.run());
//!
//!     let stored = client.create(Note { name: "a".into(), version: None }).await.unwrap();
//!     assert_eq!(stored.version.as_deref(), Some("1"));
//!     assert!(client.get("b".to_string()).await.unwrap_err().is_not_found());
//! }
//! ```
//!
//! ## Testing
//!
//! The [`mock`] module provides [`MockStore`](mock::MockStore), which answers a real
//! [`StoreClient`] from scripted expectations and reports any call that was not expected.

pub mod actor;
pub mod client;
pub mod entity;
pub mod error;
pub mod message;
pub mod mock;
pub mod tracing;

// Re-export core types for convenience
pub use actor::StoreActor;
pub use client::StoreClient;
pub use entity::StoreEntity;
pub use error::StoreError;
pub use message::{EventKind, Response, StoreEvent, StoreRequest};
