//! Deterministic merge of a remote snapshot into the local quote set.
//!
//! # Responsibility
//! - Decide, per remote record, between append, overwrite and no-op.
//! - Report what changed so callers persist and notify only when needed.
//!
//! # Invariants
//! - Local-only quotes are always retained; remote never deletes.
//! - A remote record overwrites a local one only when its timestamp is
//!   strictly newer; ties and missing timestamps keep the local fields.
//! - Output order is stable: local order first, remote additions in remote
//!   order.

use crate::model::quote::{Quote, QuoteKey};
use std::collections::HashMap;

/// Outcome counters for one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeReport {
    /// Remote quotes absent locally that were appended.
    pub added: usize,
    /// Local quotes overwritten by a strictly newer remote version.
    pub updated: usize,
}

impl MergeReport {
    /// True iff the merged set differs from the local input.
    pub fn changed(&self) -> bool {
        self.added > 0 || self.updated > 0
    }
}

/// Merges `remote` into `local` by identity key.
///
/// Remote records failing validation are skipped; they never reach the
/// store. Remote duplicates of an already-merged key are treated as
/// subsequent versions of the same quote and compared by timestamp.
pub fn reconcile(local: &[Quote], remote: &[Quote]) -> (Vec<Quote>, MergeReport) {
    let mut merged: Vec<Quote> = local.to_vec();
    let mut index: HashMap<QuoteKey, usize> = merged
        .iter()
        .enumerate()
        .map(|(position, quote)| (quote.key(), position))
        .collect();
    let mut report = MergeReport::default();

    for incoming in remote {
        if !incoming.is_valid() {
            continue;
        }

        match index.get(&incoming.key()) {
            None => {
                index.insert(incoming.key(), merged.len());
                merged.push(incoming.clone());
                report.added += 1;
            }
            Some(&position) => {
                if remote_is_newer(incoming.updated_at_ms, merged[position].updated_at_ms) {
                    merged[position] = incoming.clone();
                    report.updated += 1;
                }
            }
        }
    }

    (merged, report)
}

/// Remote wins only on a strictly greater timestamp; any missing side
/// keeps the local record (remote data is presumed stale by default).
fn remote_is_newer(remote: Option<i64>, local: Option<i64>) -> bool {
    matches!((remote, local), (Some(remote), Some(local)) if remote > local)
}

#[cfg(test)]
mod tests {
    use super::{reconcile, remote_is_newer};
    use crate::model::quote::Quote;

    fn quote(text: &str, category: &str, updated_at_ms: Option<i64>) -> Quote {
        let mut quote = Quote::new(text, category, None).unwrap();
        quote.updated_at_ms = updated_at_ms;
        quote
    }

    #[test]
    fn empty_remote_is_a_no_op() {
        let local = vec![quote("A", "X", Some(1))];
        let (merged, report) = reconcile(&local, &[]);
        assert_eq!(merged, local);
        assert!(!report.changed());
    }

    #[test]
    fn empty_local_adopts_all_valid_remote_records() {
        let remote = vec![quote("A", "X", Some(1)), quote("B", "Y", None)];
        let (merged, report) = reconcile(&[], &remote);
        assert_eq!(merged, remote);
        assert_eq!(report.added, 2);
        assert_eq!(report.updated, 0);
        assert!(report.changed());
    }

    #[test]
    fn strictly_newer_remote_overwrites_in_place() {
        let local = vec![quote("A", "X", Some(1)), quote("B", "Y", Some(9))];
        let mut newer = quote("A", "X", Some(2));
        newer.author = "Someone".to_string();

        let (merged, report) = reconcile(&local, &[newer.clone()]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], newer);
        assert_eq!(merged[1], local[1]);
        assert_eq!(report.updated, 1);
        assert_eq!(report.added, 0);
    }

    #[test]
    fn equal_or_older_remote_timestamp_keeps_local() {
        let local = vec![quote("A", "X", Some(5))];

        let (merged, report) = reconcile(&local, &[quote("A", "X", Some(5))]);
        assert_eq!(merged, local);
        assert!(!report.changed());

        let (merged, report) = reconcile(&local, &[quote("A", "X", Some(2))]);
        assert_eq!(merged, local);
        assert!(!report.changed());
    }

    #[test]
    fn missing_timestamps_keep_local() {
        let local = vec![quote("A", "X", Some(5)), quote("B", "Y", None)];
        let remote = vec![quote("A", "X", None), quote("B", "Y", Some(10))];

        let (merged, report) = reconcile(&local, &remote);
        assert_eq!(merged, local);
        assert!(!report.changed());
    }

    #[test]
    fn local_only_quotes_are_retained() {
        let local = vec![quote("A", "X", Some(1)), quote("B", "Y", Some(1))];
        let remote = vec![quote("C", "Z", Some(1))];

        let (merged, report) = reconcile(&local, &remote);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0], local[0]);
        assert_eq!(merged[1], local[1]);
        assert_eq!(merged[2], remote[0]);
        assert_eq!(report.added, 1);
    }

    #[test]
    fn invalid_remote_records_are_skipped() {
        let mut blank = quote("placeholder", "X", Some(1));
        blank.text = "   ".to_string();

        let (merged, report) = reconcile(&[], &[blank]);
        assert!(merged.is_empty());
        assert!(!report.changed());
    }

    #[test]
    fn remote_duplicate_keys_resolve_by_timestamp() {
        let first = quote("A", "X", Some(1));
        let mut second = quote("A", "X", Some(3));
        second.author = "Later".to_string();

        let (merged, report) = reconcile(&[], &[first, second.clone()]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0], second);
        assert_eq!(report.added, 1);
        assert_eq!(report.updated, 1);
    }

    #[test]
    fn reconcile_is_idempotent_once_remote_is_incorporated() {
        let local = vec![quote("A", "X", Some(1))];
        let remote = vec![quote("A", "X", Some(2)), quote("B", "Y", Some(2))];

        let (merged, first) = reconcile(&local, &remote);
        assert!(first.changed());

        let (again, second) = reconcile(&merged, &remote);
        assert_eq!(again, merged);
        assert!(!second.changed());
    }

    #[test]
    fn remote_is_newer_requires_both_timestamps() {
        assert!(remote_is_newer(Some(2), Some(1)));
        assert!(!remote_is_newer(Some(1), Some(1)));
        assert!(!remote_is_newer(Some(1), Some(2)));
        assert!(!remote_is_newer(None, Some(1)));
        assert!(!remote_is_newer(Some(1), None));
        assert!(!remote_is_newer(None, None));
    }
}
