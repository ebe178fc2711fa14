//! # Observability & Tracing
//!
//! This module provides the tracing setup shared by every binary in the workspace.
//!
//! ## What Gets Traced
//!
//! - **Store Lifecycle**: startup, shutdown and final record count
//! - **Store Operations**: Get, List, Create, Update, Delete with the record key
//! - **Reconcile Passes**: one span per pass carrying the resource key, with the chosen owner
//!   and every mutation logged inside it
//!
//! ## Usage Examples
//!
//! ```bash
//! # Compact logs (default)
//! RUST_LOG=info cargo run
//!
//! # Full records on every store call
//! RUST_LOG=debug cargo run
//!
//! # Only the reconcilers
//! RUST_LOG=mirror_sync=debug cargo run
//! ```

/// Initializes structured logging controlled by the `RUST_LOG` environment variable.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false) // Don't show module paths - we log entity_type and key instead
        .compact() // Compact format shows spans inline (e.g., "sync_pass:...")
        .init();
}
