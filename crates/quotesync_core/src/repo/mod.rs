//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the key-value snapshot access contract used by the quote store.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository APIs move opaque serialized documents; interpreting their
//!   content is the service layer's job.
//! - Repository construction verifies the backing schema before first use.

pub mod snapshot_repo;
