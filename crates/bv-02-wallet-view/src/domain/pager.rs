//! # History Pager
//!
//! Caches one merged history, cut into fixed-size pages, and remembers
//! which scan (`update_id`) it was built for. A page request against a
//! different scan id, or with an explicit rebuild, recomputes the merge.

use super::errors::ViewError;
use shared_types::ledger::{newest_first, LedgerEntry};

#[derive(Debug)]
pub struct HistoryPager {
    page_size: usize,
    /// Scan id the cached entries were built for.
    built_for: Option<u64>,
    entries: Vec<LedgerEntry>,
}

impl HistoryPager {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            built_for: None,
            entries: Vec::new(),
        }
    }

    /// Cached entries are valid for `update_id`.
    #[must_use]
    pub fn is_current(&self, update_id: u64) -> bool {
        self.built_for == Some(update_id)
    }

    /// Drop the cache; the next request rebuilds.
    pub fn invalidate(&mut self) {
        self.built_for = None;
    }

    /// Carry a cache built for `from` over to `to`; used when a scan did
    /// not touch anything this pager covers.
    pub fn restamp(&mut self, from: u64, to: u64) {
        if self.built_for == Some(from) {
            self.built_for = Some(to);
        }
    }

    /// Merge per-wallet histories into the cache, newest first.
    pub fn merge(&mut self, update_id: u64, histories: Vec<Vec<LedgerEntry>>) {
        let mut entries: Vec<LedgerEntry> = histories.into_iter().flatten().collect();
        entries.sort_by(newest_first);
        self.entries = entries;
        self.built_for = Some(update_id);
    }

    /// Number of pages; an empty history still has one (empty) page.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.entries.len().div_ceil(self.page_size).max(1)
    }

    /// One page of the cached history.
    pub fn page(&self, page_id: usize) -> Result<Vec<LedgerEntry>, ViewError> {
        if page_id >= self.page_count() {
            return Err(ViewError::InvalidRequest(format!(
                "page {page_id} out of range ({} pages)",
                self.page_count()
            )));
        }
        let start = page_id * self.page_size;
        let end = (start + self.page_size).min(self.entries.len());
        Ok(self.entries[start..end].to_vec())
    }

    #[must_use]
    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }
}
