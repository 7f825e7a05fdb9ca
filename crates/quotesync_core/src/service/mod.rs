//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep callers (CLI, sync loop, host UIs) decoupled from storage
//!   details.

pub mod quote_store;
