//! # Reconcile Errors & Outcomes
//!
//! A pass ends in one of three ways:
//!
//! - `Ok(Outcome::Synced { .. })` – the pass ran; the mutations it issued are listed.
//! - `Ok(Outcome::Skipped(reason))` – nothing to do this pass; do not retry on our account.
//! - `Err(ReconcileError)` – redeliver later (see [`ReconcileError::is_retryable`]).

use crate::resource::{Owner, Side};
use mirror_store::StoreError;
use std::fmt;

/// Store operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Get,
    List,
    Create,
    Update,
    Delete,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreOp::Get => "get",
            StoreOp::List => "list",
            StoreOp::Create => "create",
            StoreOp::Update => "update",
            StoreOp::Delete => "delete",
        })
    }
}

/// Where a store error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreTarget {
    Side(Side),
    Mapping,
}

impl fmt::Display for StoreTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreTarget::Side(side) => write!(f, "{side}"),
            StoreTarget::Mapping => f.write_str("namespace mapping"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("namespace mapping for {0:?} does not exist yet")]
    MappingNotFound(String),
    #[error("namespace mapping for {0:?} has no target namespace yet")]
    MappingNotReady(String),
    #[error("{op} on {target} store failed: {source}")]
    Store {
        target: StoreTarget,
        op: StoreOp,
        #[source]
        source: StoreError,
    },
    #[error("reconcile pass cancelled")]
    Cancelled,
}

impl ReconcileError {
    pub(crate) fn store(side: Side, op: StoreOp, source: StoreError) -> Self {
        ReconcileError::Store {
            target: StoreTarget::Side(side),
            op,
            source,
        }
    }

    pub(crate) fn mapping(op: StoreOp, source: StoreError) -> Self {
        ReconcileError::Store {
            target: StoreTarget::Mapping,
            op,
            source,
        }
    }

    /// Whether redelivering the key may succeed.
    ///
    /// Store failures are always retryable: the core cannot tell transient from permanent
    /// backend failures. Only cancellation is final.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ReconcileError::Cancelled)
    }
}

/// A write issued during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Ownership or bound tag written onto an existing copy.
    Tagged(Side),
    Created(Side),
    Updated(Side),
    Deleted(Side),
}

/// Why a pass ended without doing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Neither side has a copy.
    Absent,
    /// Both copies exist and neither carries an ownership tag.
    Indeterminate,
    /// The mirror is tagged for the side that does not own the resource.
    ConflictingTags,
    /// The mirror was removed after binding; it is not recreated.
    AlreadyBound,
    /// The home copy to adopt from is not there.
    NotObserved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Synced {
        owner: Option<Owner>,
        mutations: Vec<Mutation>,
    },
    Skipped(SkipReason),
}

impl Outcome {
    /// Writes issued by the pass; empty for skipped passes.
    pub fn mutations(&self) -> &[Mutation] {
        match self {
            Outcome::Synced { mutations, .. } => mutations,
            Outcome::Skipped(_) => &[],
        }
    }

    pub fn is_noop(&self) -> bool {
        self.mutations().is_empty()
    }
}
