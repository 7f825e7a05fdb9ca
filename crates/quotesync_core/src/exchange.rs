//! JSON import/export boundary for quote collections.
//!
//! # Responsibility
//! - Parse user-supplied JSON arrays into validated quotes and merge them
//!   into the store by identity key.
//! - Produce the downloadable pretty-printed export artifact.
//!
//! # Invariants
//! - Import ignores timestamps: a new key is added, an existing key is
//!   skipped, never overwritten.
//! - Invalid records are counted and skipped, not fatal to the batch.
//! - The store is persisted at most once per import batch.

use crate::model::quote::Quote;
use crate::repo::snapshot_repo::SnapshotRepository;
use crate::service::quote_store::{QuoteStore, StoreError};
use log::{info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Per-batch import counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportReport {
    /// Records appended to the store.
    pub added: usize,
    /// Records failing the validity predicate.
    pub skipped_invalid: usize,
    /// Records whose identity key was already present.
    pub skipped_existing: usize,
}

/// Import failure taxonomy.
#[derive(Debug)]
pub enum ImportError {
    /// The payload is not syntactically valid JSON.
    Parse(serde_json::Error),
    /// The payload parsed but is not a JSON array.
    NotAnArray,
    /// Persisting the merged batch failed.
    Store(StoreError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "import payload is not valid JSON: {err}"),
            Self::NotAnArray => write!(f, "import payload must be a JSON array of quotes"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::NotAnArray => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for ImportError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Merges a JSON array payload into the store by identity key.
///
/// Timestamps carried by imported records are discarded; imported quotes
/// are stamped at merge time like user-added ones.
pub fn import_into<R: SnapshotRepository>(
    store: &mut QuoteStore<R>,
    json: &str,
) -> Result<ImportReport, ImportError> {
    let value: serde_json::Value = serde_json::from_str(json).map_err(ImportError::Parse)?;
    let records = match value {
        serde_json::Value::Array(records) => records,
        _ => return Err(ImportError::NotAnArray),
    };

    let mut report = ImportReport::default();
    let mut existing: HashSet<_> = store.quotes().iter().map(Quote::key).collect();
    let mut merged: Vec<Quote> = store.quotes().to_vec();

    for record in records {
        let mut quote = match serde_json::from_value::<Quote>(record) {
            Ok(quote) if quote.is_valid() => quote,
            _ => {
                report.skipped_invalid += 1;
                continue;
            }
        };
        quote.normalize();

        if !existing.insert(quote.key()) {
            report.skipped_existing += 1;
            continue;
        }

        quote.touch();
        merged.push(quote);
        report.added += 1;
    }

    if report.added > 0 {
        store.replace_all(merged)?;
    }

    if report.skipped_invalid > 0 {
        warn!(
            "event=import module=exchange status=partial skipped_invalid={}",
            report.skipped_invalid
        );
    }
    info!(
        "event=import module=exchange status=ok added={} skipped_existing={}",
        report.added, report.skipped_existing
    );
    Ok(report)
}

/// Serializes a quote slice as the pretty-printed export artifact.
///
/// A bare JSON array, matching the accepted import shape.
pub fn export_json(quotes: &[Quote]) -> String {
    serde_json::to_string_pretty(quotes).expect("quote serialization cannot fail")
}

#[cfg(test)]
mod tests {
    use super::export_json;
    use crate::model::quote::Quote;

    #[test]
    fn export_is_a_pretty_printed_array() {
        let quotes = vec![Quote::new("A", "X", None).unwrap()];
        let json = export_json(&quotes);
        assert!(json.starts_with("[\n"));
        assert!(json.contains(r#""text": "A""#));
    }

    #[test]
    fn export_of_empty_slice_is_empty_array() {
        assert_eq!(export_json(&[]), "[]");
    }
}
