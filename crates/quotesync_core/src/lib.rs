//! Core quote store synchronizer.
//! This crate is the single source of truth for quote identity, merge
//! policy and storage invariants.

pub mod db;
pub mod exchange;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use exchange::{export_json, import_into, ImportError, ImportReport};
pub use logging::{default_log_level, init_logging};
pub use model::quote::{
    unique_categories, Quote, QuoteKey, QuoteValidationError, DEFAULT_AUTHOR, DEFAULT_CATEGORY,
};
pub use repo::snapshot_repo::{
    RepoError, RepoResult, SnapshotRepository, SqliteSnapshotRepository,
};
pub use service::quote_store::{
    default_quotes, NewQuote, QuoteStore, StoreError, StoreResult, LAST_VIEWED_KEY, QUOTES_KEY,
};
pub use sync::reconcile::{reconcile, MergeReport};
pub use sync::scheduler::{
    try_run_tick, FetchError, RemoteQuoteSource, SyncError, SyncReport, SyncScheduler,
    TickOutcome, TickState,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
