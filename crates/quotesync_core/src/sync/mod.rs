//! Local/remote reconciliation loop.
//!
//! # Responsibility
//! - Merge remote snapshots into the local store under a deterministic
//!   keyed policy (`reconcile`).
//! - Drive the periodic fetch-reconcile-persist cycle (`scheduler`).
//!
//! # Invariants
//! - Reconciliation is pure; only the scheduler touches the store.
//! - At most one tick runs against the store at any time.

pub mod reconcile;
pub mod scheduler;
