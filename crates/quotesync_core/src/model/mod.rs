//! Canonical quote domain model.
//!
//! # Responsibility
//! - Define the single record shape shared by storage, sync and exchange.
//! - Keep identity and validity rules in one place.
//!
//! # Invariants
//! - Identity is the `(text, category)` pair; there is no surrogate id.
//! - A quote never crosses the storage boundary without passing validation.

pub mod quote;
