//! Authoritative quote store over a snapshot repository.
//!
//! # Responsibility
//! - Own the in-memory quote list and mediate every read/write of the
//!   persisted document.
//! - Self-heal corrupt persisted state by reseeding the bootstrap set.
//!
//! # Invariants
//! - No two stored quotes share an identity key.
//! - Every stored quote passes `Quote::validate()`.
//! - Mutations are write-through: the persisted document is updated before
//!   the operation is considered complete.

use crate::model::quote::{unique_categories, Quote, QuoteKey, QuoteValidationError};
use crate::repo::snapshot_repo::{RepoError, SnapshotRepository};
use log::{info, warn};
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Fixed storage key for the quote collection document.
pub const QUOTES_KEY: &str = "quotes_v1";
/// Fixed storage key for the most recently viewed quote.
pub const LAST_VIEWED_KEY: &str = "last_viewed_v1";

/// Version written into every persisted quote document.
pub const DOCUMENT_SCHEMA_VERSION: u32 = 1;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level error taxonomy.
///
/// Corrupt persisted content is not represented here: it is recovered
/// internally by reseeding and surfaced only through `was_seeded()`.
#[derive(Debug)]
pub enum StoreError {
    Validation(QuoteValidationError),
    DuplicateKey(QuoteKey),
    UnsupportedDocumentVersion { found: u32, supported: u32 },
    Repo(RepoError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::DuplicateKey(key) => write!(f, "quote already exists: {key}"),
            Self::UnsupportedDocumentVersion { found, supported } => write!(
                f,
                "quote document version {found} is newer than supported {supported}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<QuoteValidationError> for StoreError {
    fn from(value: QuoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// User-facing input for the add operation.
#[derive(Debug, Clone, Default)]
pub struct NewQuote {
    pub text: String,
    pub category: String,
    pub author: Option<String>,
}

/// Persisted document envelope.
///
/// Pre-versioned deployments persisted a bare JSON array; the envelope
/// adds a schema version. Loading accepts both, writing always emits the
/// envelope.
#[derive(Debug, Serialize)]
struct QuoteDocument {
    #[serde(rename = "schemaVersion")]
    schema_version: u32,
    quotes: Vec<Quote>,
}

/// Bootstrap set used when storage is empty or corrupt.
pub fn default_quotes() -> Vec<Quote> {
    [
        (
            "The best way to get started is to quit talking and begin doing.",
            "Motivation",
        ),
        (
            "Don’t let yesterday take up too much of today.",
            "Motivation",
        ),
        (
            "Life is what happens when you're busy making other plans.",
            "Life",
        ),
        ("In the middle of difficulty lies opportunity.", "Inspiration"),
    ]
    .into_iter()
    .map(|(text, category)| {
        Quote::new(text, category, None).expect("default quotes are statically valid")
    })
    .collect()
}

/// Authoritative quote store bound to one snapshot repository.
pub struct QuoteStore<R: SnapshotRepository> {
    repo: R,
    quotes: Vec<Quote>,
    seeded: bool,
}

impl<R: SnapshotRepository> QuoteStore<R> {
    /// Opens the store, loading the persisted document.
    ///
    /// Missing, unparseable, or structurally wrong content falls back to
    /// the bootstrap set, which is immediately persisted (self-healing).
    /// Individual entries failing validation are dropped. A document with a
    /// newer schema version than this binary supports is an error rather
    /// than corruption; reseeding over it would destroy newer data.
    pub fn open(repo: R) -> StoreResult<Self> {
        let mut store = Self {
            repo,
            quotes: Vec::new(),
            seeded: false,
        };
        store.reload()?;
        Ok(store)
    }

    /// Re-reads the persisted document, replacing the in-memory list.
    pub fn reload(&mut self) -> StoreResult<()> {
        let raw = self.repo.read(QUOTES_KEY)?;
        let parsed = match raw.as_deref() {
            Some(raw) => parse_document(raw)?,
            None => None,
        };

        match parsed {
            Some(quotes) => {
                self.quotes = dedupe_valid(quotes);
                self.seeded = false;
                info!(
                    "event=store_load module=store status=ok seeded=false count={}",
                    self.quotes.len()
                );
            }
            None => {
                if raw.is_some() {
                    warn!("event=store_load module=store status=reseeded reason=corrupt_document");
                }
                self.quotes = default_quotes();
                self.seeded = true;
                self.save()?;
                info!(
                    "event=store_load module=store status=ok seeded=true count={}",
                    self.quotes.len()
                );
            }
        }
        Ok(())
    }

    /// True when the last load fell back to the bootstrap set.
    pub fn was_seeded(&self) -> bool {
        self.seeded
    }

    /// The authoritative in-memory list.
    pub fn quotes(&self) -> &[Quote] {
        &self.quotes
    }

    /// Persists the current in-memory list as a total replace.
    ///
    /// Idempotent: saving unchanged content yields identical bytes.
    pub fn save(&self) -> StoreResult<()> {
        let document = QuoteDocument {
            schema_version: DOCUMENT_SCHEMA_VERSION,
            quotes: self.quotes.clone(),
        };
        let serialized = serde_json::to_string(&document)
            .expect("quote document serialization cannot fail");
        self.repo.write(QUOTES_KEY, &serialized)?;
        Ok(())
    }

    /// Adds a user-submitted quote.
    ///
    /// # Contract
    /// - Trims fields and applies the author sentinel.
    /// - Rejects invalid input with `Validation`, duplicates with
    ///   `DuplicateKey`.
    /// - Stamps `updated_at_ms` and persists write-through before
    ///   returning.
    pub fn add(&mut self, draft: NewQuote) -> StoreResult<&Quote> {
        let mut quote = Quote::new(draft.text, draft.category, draft.author)?;
        let key = quote.key();
        if self.quotes.iter().any(|existing| existing.key() == key) {
            warn!("event=store_add module=store status=rejected reason=duplicate_key");
            return Err(StoreError::DuplicateKey(key));
        }

        quote.touch();
        self.quotes.push(quote);
        self.save()?;
        info!(
            "event=store_add module=store status=ok count={}",
            self.quotes.len()
        );
        Ok(self.quotes.last().expect("quote was just pushed"))
    }

    /// Replaces the whole list with a merged set and persists it.
    ///
    /// Used by the sync loop after reconciliation; the input is trusted to
    /// already satisfy the uniqueness invariant but is re-checked cheaply.
    pub fn replace_all(&mut self, quotes: Vec<Quote>) -> StoreResult<()> {
        self.quotes = dedupe_valid(quotes);
        self.save()
    }

    /// Resets the store to the bootstrap defaults and persists them.
    pub fn reset_to_defaults(&mut self) -> StoreResult<()> {
        self.quotes = default_quotes();
        self.seeded = true;
        self.save()?;
        info!("event=store_reset module=store status=ok");
        Ok(())
    }

    /// Sorted unique categories of the current list.
    pub fn categories(&self) -> Vec<String> {
        unique_categories(&self.quotes)
    }

    /// Uniform random pick, optionally restricted to one category.
    ///
    /// Returns `None` when the (filtered) pool is empty.
    pub fn random_quote(&self, category: Option<&str>) -> Option<Quote> {
        let mut rng = rand::thread_rng();
        match category {
            Some(category) => {
                let pool: Vec<&Quote> = self
                    .quotes
                    .iter()
                    .filter(|quote| quote.category == category)
                    .collect();
                pool.choose(&mut rng).map(|quote| (*quote).clone())
            }
            None => self.quotes.choose(&mut rng).cloned(),
        }
    }

    /// Persists the most recently viewed quote under its own key.
    pub fn record_last_viewed(&self, quote: &Quote) -> StoreResult<()> {
        let serialized =
            serde_json::to_string(quote).expect("quote serialization cannot fail");
        self.repo.write(LAST_VIEWED_KEY, &serialized)?;
        Ok(())
    }

    /// Returns the most recently viewed quote, if one was recorded.
    ///
    /// Corrupt or invalid content degrades to `None`.
    pub fn last_viewed(&self) -> StoreResult<Option<Quote>> {
        let raw = match self.repo.read(LAST_VIEWED_KEY)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        match serde_json::from_str::<Quote>(&raw) {
            Ok(quote) if quote.is_valid() => Ok(Some(quote)),
            _ => Ok(None),
        }
    }
}

/// Parses a persisted document, returning `None` for corrupt content.
///
/// Accepts the versioned envelope and the legacy bare-array form. Entries
/// are converted one at a time; a record that fails to deserialize is
/// dropped without discarding the rest of the document.
fn parse_document(raw: &str) -> StoreResult<Option<Vec<Quote>>> {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => return Ok(None),
    };

    let entries = match value {
        serde_json::Value::Array(entries) => entries,
        serde_json::Value::Object(mut fields) => {
            let version = match fields
                .get("schemaVersion")
                .and_then(serde_json::Value::as_u64)
            {
                Some(version) => version,
                None => return Ok(None),
            };
            if version > u64::from(DOCUMENT_SCHEMA_VERSION) {
                return Err(StoreError::UnsupportedDocumentVersion {
                    found: u32::try_from(version).unwrap_or(u32::MAX),
                    supported: DOCUMENT_SCHEMA_VERSION,
                });
            }
            match fields.remove("quotes") {
                Some(serde_json::Value::Array(entries)) => entries,
                _ => return Ok(None),
            }
        }
        _ => return Ok(None),
    };

    Ok(Some(
        entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value::<Quote>(entry).ok())
            .collect(),
    ))
}

/// Drops invalid entries and later duplicates, preserving first-seen order.
fn dedupe_valid(quotes: Vec<Quote>) -> Vec<Quote> {
    let mut seen: HashSet<QuoteKey> = HashSet::new();
    quotes
        .into_iter()
        .filter(|quote| quote.is_valid() && seen.insert(quote.key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{dedupe_valid, parse_document, StoreError};
    use crate::model::quote::Quote;

    fn quote(text: &str, category: &str) -> Quote {
        Quote::new(text, category, None).unwrap()
    }

    #[test]
    fn parse_document_accepts_envelope_and_legacy_array() {
        let envelope = r#"{"schemaVersion":1,"quotes":[{"text":"a","category":"X"}]}"#;
        let parsed = parse_document(envelope).unwrap().unwrap();
        assert_eq!(parsed.len(), 1);

        let legacy = r#"[{"text":"a","category":"X"}]"#;
        let parsed = parse_document(legacy).unwrap().unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn parse_document_drops_only_malformed_entries() {
        let mixed = r#"[{"text":"keep","category":"X"},{"text":42,"category":"X"},{"text":"also keep","category":"Y"}]"#;
        let parsed = parse_document(mixed).unwrap().unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].text, "keep");
        assert_eq!(parsed[1].text, "also keep");

        let envelope =
            r#"{"schemaVersion":1,"quotes":[{"text":"keep","category":"X"},"not an object"]}"#;
        let parsed = parse_document(envelope).unwrap().unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].text, "keep");
    }

    #[test]
    fn parse_document_flags_corrupt_content_as_none() {
        assert!(parse_document("{not json").unwrap().is_none());
        assert!(parse_document(r#"{"unexpected":"shape"}"#).unwrap().is_none());
        assert!(parse_document("42").unwrap().is_none());
    }

    #[test]
    fn parse_document_rejects_newer_schema_version() {
        let newer = r#"{"schemaVersion":99,"quotes":[]}"#;
        let err = parse_document(newer).unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnsupportedDocumentVersion { found: 99, .. }
        ));
    }

    #[test]
    fn dedupe_valid_keeps_first_occurrence_and_drops_invalid() {
        let quotes = vec![
            quote("a", "X"),
            Quote {
                text: "  ".to_string(),
                ..quote("placeholder", "X")
            },
            quote("a", "X"),
            quote("b", "Y"),
        ];
        let deduped = dedupe_valid(quotes);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].text, "a");
        assert_eq!(deduped[1].text, "b");
    }
}
