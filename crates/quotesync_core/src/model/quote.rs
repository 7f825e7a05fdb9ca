//! Quote domain model.
//!
//! # Responsibility
//! - Define the canonical quote record used by store, sync and exchange.
//! - Provide the identity key and the validity predicate shared by all of
//!   them.
//!
//! # Invariants
//! - `text` and `category` are non-empty after trimming for every quote
//!   that passes `validate()`.
//! - Two quotes are "the same" iff their `(text, category)` pairs match
//!   exactly (case-sensitive).
//! - `updated_at_ms` is a logical timestamp consumed only by the
//!   reconciliation policy; it never participates in identity.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Sentinel category applied when an input record carries none.
pub const DEFAULT_CATEGORY: &str = "General";
/// Sentinel author applied when an input record carries none.
pub const DEFAULT_AUTHOR: &str = "Unknown";

/// Validation failure for a candidate quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteValidationError {
    EmptyText,
    EmptyCategory,
}

impl Display for QuoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "quote text must not be empty"),
            Self::EmptyCategory => write!(f, "quote category must not be empty"),
        }
    }
}

impl Error for QuoteValidationError {}

/// De-duplication signature: the exact `(text, category)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuoteKey {
    pub text: String,
    pub category: String,
}

impl Display for QuoteKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "`{}` / `{}`", self.text, self.category)
    }
}

/// Canonical quote record.
///
/// Wire/storage field names follow the persisted JSON schema: `text`,
/// `category`, `author`, `updatedAt`. Absent `category`/`author` fields
/// deserialize to their sentinels; a present-but-blank field is invalid,
/// not defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub text: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_author")]
    pub author: String,
    /// Logical last-modification time in epoch milliseconds.
    #[serde(
        rename = "updatedAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at_ms: Option<i64>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_author() -> String {
    DEFAULT_AUTHOR.to_string()
}

impl Quote {
    /// Builds a validated quote from user-facing input.
    ///
    /// # Contract
    /// - Trims `text` and `category`.
    /// - Applies `DEFAULT_AUTHOR` when `author` is `None` or blank.
    /// - Leaves `updated_at_ms` unset; callers stamp it at the persistence
    ///   boundary.
    pub fn new(
        text: impl Into<String>,
        category: impl Into<String>,
        author: Option<String>,
    ) -> Result<Self, QuoteValidationError> {
        let quote = Self {
            text: text.into().trim().to_string(),
            category: category.into().trim().to_string(),
            author: author
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(default_author),
            updated_at_ms: None,
        };
        quote.validate()?;
        Ok(quote)
    }

    /// Pure validity predicate: both identity fields non-empty after
    /// trimming.
    pub fn validate(&self) -> Result<(), QuoteValidationError> {
        if self.text.trim().is_empty() {
            return Err(QuoteValidationError::EmptyText);
        }
        if self.category.trim().is_empty() {
            return Err(QuoteValidationError::EmptyCategory);
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Returns the de-duplication signature for this quote.
    pub fn key(&self) -> QuoteKey {
        QuoteKey {
            text: self.text.clone(),
            category: self.category.clone(),
        }
    }

    /// Trims identity fields and reapplies the author sentinel in place.
    ///
    /// Used at input boundaries (file import) so identity keys never carry
    /// accidental whitespace.
    pub fn normalize(&mut self) {
        self.text = self.text.trim().to_string();
        self.category = self.category.trim().to_string();
        let author = self.author.trim();
        self.author = if author.is_empty() {
            default_author()
        } else {
            author.to_string()
        };
    }

    /// Stamps the logical modification time with the wall clock.
    pub fn touch(&mut self) {
        self.updated_at_ms = Some(now_epoch_ms());
    }
}

/// Current wall-clock time in epoch milliseconds.
///
/// Clamped to zero for clocks set before the epoch rather than panicking.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// Returns the sorted, deduplicated category list for a quote slice.
pub fn unique_categories(quotes: &[Quote]) -> Vec<String> {
    let mut categories: Vec<String> = quotes.iter().map(|quote| quote.category.clone()).collect();
    categories.sort();
    categories.dedup();
    categories
}

#[cfg(test)]
mod tests {
    use super::{unique_categories, Quote, QuoteValidationError, DEFAULT_AUTHOR};

    #[test]
    fn new_trims_fields_and_defaults_author() {
        let quote = Quote::new("  stay hungry  ", " Motivation ", None).unwrap();
        assert_eq!(quote.text, "stay hungry");
        assert_eq!(quote.category, "Motivation");
        assert_eq!(quote.author, DEFAULT_AUTHOR);
        assert_eq!(quote.updated_at_ms, None);
    }

    #[test]
    fn new_rejects_blank_identity_fields() {
        let text_err = Quote::new("   ", "Motivation", None).unwrap_err();
        assert_eq!(text_err, QuoteValidationError::EmptyText);

        let category_err = Quote::new("stay hungry", "  ", None).unwrap_err();
        assert_eq!(category_err, QuoteValidationError::EmptyCategory);
    }

    #[test]
    fn blank_author_falls_back_to_sentinel() {
        let quote = Quote::new("stay hungry", "Motivation", Some("   ".to_string())).unwrap();
        assert_eq!(quote.author, DEFAULT_AUTHOR);
    }

    #[test]
    fn key_is_case_sensitive_exact_match() {
        let a = Quote::new("A", "X", None).unwrap();
        let b = Quote::new("a", "X", None).unwrap();
        let c = Quote::new("A", "X", Some("Someone".to_string())).unwrap();
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), c.key());
    }

    #[test]
    fn deserialize_applies_sentinels_for_absent_fields() {
        let quote: Quote = serde_json::from_str(r#"{"text":"only text"}"#).unwrap();
        assert_eq!(quote.category, "General");
        assert_eq!(quote.author, "Unknown");
        assert_eq!(quote.updated_at_ms, None);
    }

    #[test]
    fn serialize_uses_wire_field_names_and_omits_missing_timestamp() {
        let quote = Quote::new("A", "X", None).unwrap();
        let json = serde_json::to_string(&quote).unwrap();
        assert!(json.contains(r#""text":"A""#));
        assert!(json.contains(r#""category":"X""#));
        assert!(!json.contains("updatedAt"));

        let mut stamped = quote;
        stamped.updated_at_ms = Some(42);
        let json = serde_json::to_string(&stamped).unwrap();
        assert!(json.contains(r#""updatedAt":42"#));
    }

    #[test]
    fn unique_categories_sorts_and_dedupes() {
        let quotes = vec![
            Quote::new("a", "Life", None).unwrap(),
            Quote::new("b", "Inspiration", None).unwrap(),
            Quote::new("c", "Life", None).unwrap(),
        ];
        assert_eq!(unique_categories(&quotes), vec!["Inspiration", "Life"]);
    }
}
