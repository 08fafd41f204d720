//! Reconciled series records and their store
//!
//! A `SeriesRecord` is the unified local record per series: remote list
//! identity and progress, matched local directory, and descriptive
//! metadata from the detail lookup. The store guarantees at most one
//! record per remote series id.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::matching::MatchConfidence;
use crate::normalize::slug_key;

/// The reconciled/local entity, one per tracked series.
///
/// Invariants: a non-null `series_id` appears in at most one record, and a
/// non-empty `key` always equals `slug_key(directory)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesRecord {
    pub key: String,
    pub series_id: Option<i64>,
    pub title: String,
    pub url: String,
    pub chapter: Option<f64>,
    pub volume: Option<f64>,
    pub user_rating: Option<f64>,
    pub latest_chapter_known: Option<f64>,
    pub associated_titles: Vec<String>,
    /// Matched folder name, empty while unmatched.
    pub directory: String,
    /// Human override of the matched title.
    pub alias: Option<String>,
    pub match_confidence: MatchConfidence,
    pub year: Option<String>,
    pub completed: bool,
    pub series_type: Option<String>,
    pub status: Option<String>,
    pub updated_at: String,
}

impl SeriesRecord {
    /// Set the matched directory and derive `key` from it.
    pub fn set_directory(&mut self, directory: &str) {
        self.directory = directory.to_string();
        self.key = slug_key(directory);
    }
}

/// Whole-document store of series records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeriesStore {
    records: Vec<SeriesRecord>,
}

impl SeriesStore {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeriesRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[SeriesRecord] {
        &self.records
    }

    pub fn find_by_series_id(&self, series_id: i64) -> Option<&SeriesRecord> {
        self.records.iter().find(|r| r.series_id == Some(series_id))
    }

    pub fn contains_series_id(&self, series_id: i64) -> bool {
        self.find_by_series_id(series_id).is_some()
    }

    /// Find a record whose title slugs to the given key.
    pub fn find_by_title_key(&self, title_key: &str) -> Option<&SeriesRecord> {
        self.records.iter().find(|r| slug_key(&r.title) == title_key)
    }

    /// Append a record, rejecting a duplicate remote series id.
    pub fn add(&mut self, record: SeriesRecord) -> Result<()> {
        if let Some(series_id) = record.series_id {
            if self.contains_series_id(series_id) {
                bail!("Series id {} already present in store", series_id);
            }
        }
        self.records.push(record);
        Ok(())
    }

    /// Replace the whole record set (e.g. after a progress rebuild).
    pub fn replace_all(&mut self, records: Vec<SeriesRecord>) {
        self.records = records;
    }

    /// Drop records whose key matches, returning how many were removed.
    pub fn remove_by_key(&mut self, key: &str) -> usize {
        let before = self.records.len();
        self.records.retain(|r| r.key != key);
        before - self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(series_id: i64, title: &str) -> SeriesRecord {
        SeriesRecord {
            series_id: Some(series_id),
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_duplicate_series_id_rejected() {
        let mut store = SeriesStore::default();
        store.add(record(1, "One Piece")).unwrap();
        assert!(store.add(record(1, "One Piece (dup)")).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unlinked_records_do_not_collide() {
        let mut store = SeriesStore::default();
        store
            .add(SeriesRecord {
                title: "Local Only A".into(),
                ..Default::default()
            })
            .unwrap();
        store
            .add(SeriesRecord {
                title: "Local Only B".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_find_by_title_key() {
        let mut store = SeriesStore::default();
        store.add(record(5, "Attack on Titan")).unwrap();
        assert!(store.find_by_title_key("attack-on-titan").is_some());
        assert!(store.find_by_title_key("one-piece").is_none());
    }

    #[test]
    fn test_set_directory_derives_key() {
        let mut rec = record(9, "Dr. STONE");
        rec.set_directory("Dr. Stone");
        assert_eq!(rec.directory, "Dr. Stone");
        assert_eq!(rec.key, slug_key("Dr. Stone"));
    }

    #[test]
    fn test_remove_by_key() {
        let mut store = SeriesStore::default();
        let mut rec = record(7, "Ghost Series");
        rec.set_directory("Ghost Series");
        store.add(rec).unwrap();
        assert_eq!(store.remove_by_key("ghost-series"), 1);
        assert!(store.is_empty());
    }
}
