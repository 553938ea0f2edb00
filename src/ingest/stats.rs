//! Per-pass ingestion statistics.

use crate::catalog::CatalogChange;
use serde::{Deserialize, Serialize};

/// Statistics for one drain of the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainStats {
    /// Messages parsed and merged into the catalog
    pub processed: usize,
    /// Messages whose processing failed
    pub failed: usize,
    /// Books created by this drain
    pub books_created: usize,
    /// Notes added across all books
    pub notes_added: usize,
}

impl DrainStats {
    pub fn record_change(&mut self, change: &CatalogChange) {
        self.processed += 1;
        self.notes_added += change.notes_added();
        if change.is_new_book() {
            self.books_created += 1;
        }
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Merge another DrainStats into this one by summing all counts.
    pub fn merge(&mut self, other: &DrainStats) {
        self.processed += other.processed;
        self.failed += other.failed;
        self.books_created += other.books_created;
        self.notes_added += other.notes_added;
    }

    pub fn is_empty(&self) -> bool {
        self.processed == 0 && self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_merge() {
        let mut stats = DrainStats::default();
        stats.record_change(&CatalogChange::BookCreated {
            author: "A".into(),
            title: "T".into(),
            notes_added: 3,
        });
        stats.record_change(&CatalogChange::Unchanged {
            author: "A".into(),
            title: "T".into(),
        });
        stats.record_failure();

        let mut total = DrainStats::default();
        total.merge(&stats);
        total.merge(&stats);
        assert_eq!(
            total,
            DrainStats {
                processed: 4,
                failed: 2,
                books_created: 2,
                notes_added: 6,
            }
        );
        assert!(DrainStats::default().is_empty());
    }
}
