//! Review queue for ambiguous matches
//!
//! Anything the reconciliation engine could not confirm lands here with
//! the candidate directories it considered, so a human can pick one (or
//! discard the entry) instead of the engine guessing.

use serde::{Deserialize, Serialize};

use crate::matching::MatchConfidence;
use crate::remote::ReadingListEntry;
use crate::series::SeriesRecord;

/// An alternate title, pre-slugged for directory comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociatedTitle {
    pub title: String,
    pub key: String,
}

/// One plausible directory match surfaced for human review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub tier: MatchConfidence,
    pub title: String,
    pub normalized_title: String,
    pub directory: String,
    pub key: String,
}

/// A series awaiting human resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub series_id: i64,
    pub title: String,
    pub normalized_title: String,
    pub associated_titles: Vec<AssociatedTitle>,
    pub possible_directories: Vec<CandidateMatch>,
    /// Draft record the engine staged; finalized on resolution.
    pub draft: SeriesRecord,
    /// The reading-list entry that produced this, replayed on resolution.
    pub source_item: ReadingListEntry,
    pub created_at: String,
}

/// Whole-document review queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewQueue {
    entries: Vec<ReviewEntry>,
}

impl ReviewQueue {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ReviewEntry] {
        &self.entries
    }

    pub fn find(&self, series_id: i64) -> Option<&ReviewEntry> {
        self.entries.iter().find(|e| e.series_id == series_id)
    }

    pub fn contains(&self, series_id: i64) -> bool {
        self.find(series_id).is_some()
    }

    /// Add an entry unless one already exists for the series id.
    /// Returns whether the entry was added.
    pub fn push_unique(&mut self, entry: ReviewEntry) -> bool {
        if self.contains(entry.series_id) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Remove the entry for a series id. Returns whether one was removed.
    pub fn remove(&mut self, series_id: i64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.series_id != series_id);
        self.entries.len() < before
    }
}
