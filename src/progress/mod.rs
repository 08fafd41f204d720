//! Chapter/volume progress merging
//!
//! Merges progress across the three sources: the remote list (via the
//! series store), the reader registry, and the directory index. The
//! merged entry set is rebuilt wholesale on every run; its numeric ids
//! are a dense sequence with no meaning across rebuilds.

use serde::{Deserialize, Serialize};

use crate::library::SeriesDirectory;
use crate::reader::ReaderRegistryEntry;
use crate::remote::{ChapterUpdate, ListClient};
use crate::series::SeriesRecord;

/// Outbound chapter updates are grouped into blocks of this size to
/// respect upstream payload limits.
pub const UPDATE_BLOCK_SIZE: usize = 100;

/// Union of series record and reader registry state for one key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedSeriesEntry {
    /// Dense per-rebuild sequence number; not stable across rebuilds.
    pub id: u64,
    pub key: String,
    pub series: Option<SeriesRecord>,
    pub reader: Option<ReaderRegistryEntry>,
    /// Highest chapter found in the matched directory, if any.
    pub directory_chapter: Option<f64>,
}

/// An orphaned reader entry that was dropped during a rebuild.
#[derive(Debug, Clone)]
pub struct RemovedOrphan {
    pub series_id: Option<i64>,
    pub title: String,
}

impl RemovedOrphan {
    /// Remote series id for display; reader-only entries have none.
    pub fn display_id(&self) -> String {
        self.series_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unlinked".to_string())
    }
}

/// Result of one full merge rebuild.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub merged: Vec<MergedSeriesEntry>,
    /// The new series record set, with orphans removed and chapters merged.
    pub series: Vec<SeriesRecord>,
    pub removed: Vec<RemovedOrphan>,
    /// Chapter updates for records whose chapter changed during merge.
    pub updates: Vec<ChapterUpdate>,
}

/// A reader chapter counts as empty when it is unknown, zero, or NaN.
/// The remote service accepts neither chapter 0 nor fractional chapters.
pub fn chapter_is_empty(chapter: Option<f64>) -> bool {
    match chapter {
        None => true,
        Some(v) => v.is_nan() || v == 0.0,
    }
}

/// Merge the reader's chapter into a record. Returns whether the record
/// changed.
///
/// No reader progress means "just started": the record is pinned to
/// chapter 1. Otherwise the reader is authoritative, compared and applied
/// at integer (floored) precision to avoid redundant outbound writes.
pub fn merge_chapter_progress(record: &mut SeriesRecord, reader_chapter: Option<f64>) -> bool {
    let record_chapter = record.chapter.unwrap_or(0.0);

    if chapter_is_empty(reader_chapter) {
        if record_chapter == 1.0 {
            return false;
        }
        record.chapter = Some(1.0);
        return true;
    }

    let reader_floor = reader_chapter.unwrap_or(0.0).floor().max(1.0);
    if reader_floor == record_chapter.floor() {
        return false;
    }

    record.chapter = Some(reader_floor);
    true
}

/// Rebuild the merged entry set from scratch.
///
/// Reader entries whose key has no live directory are orphans: they are
/// dropped from the merged output and their series record (if any) is
/// removed, one log line per removal.
pub fn rebuild(
    series: &[SeriesRecord],
    reader: &[ReaderRegistryEntry],
    directories: &[SeriesDirectory],
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    let live_reader: Vec<&ReaderRegistryEntry> = reader
        .iter()
        .filter(|entry| {
            let alive = directories.iter().any(|d| d.key == entry.key);
            if !alive {
                let linked = series.iter().find(|r| !r.key.is_empty() && r.key == entry.key);
                tracing::info!(
                    "Removing orphaned reader entry {} ({}): directory is gone",
                    linked
                        .and_then(|r| r.series_id)
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| entry.reader_series_id.clone()),
                    entry.reader_title
                );
                outcome.removed.push(RemovedOrphan {
                    series_id: linked.and_then(|r| r.series_id),
                    title: entry.reader_title.clone(),
                });
            }
            alive
        })
        .collect();

    let removed_keys: Vec<String> = reader
        .iter()
        .filter(|entry| !directories.iter().any(|d| d.key == entry.key))
        .map(|entry| entry.key.clone())
        .collect();

    // New record set: cascade orphan removal, then merge reader progress.
    for record in series {
        if !record.key.is_empty() && removed_keys.contains(&record.key) {
            continue;
        }

        let mut updated = record.clone();
        let reader_entry = live_reader.iter().find(|e| e.key == updated.key);
        let changed = merge_chapter_progress(&mut updated, reader_entry.and_then(|e| e.reader_chapter));

        if changed {
            if let Some(series_id) = updated.series_id {
                outcome.updates.push(ChapterUpdate {
                    series_id,
                    chapter: outbound_chapter(updated.chapter),
                    volume: updated.volume.map(|v| v.floor().max(0.0) as u32).filter(|&v| v > 0),
                });
            }
        }

        outcome.series.push(updated);
    }

    // Merged entries: one per key across both sources, dense ids.
    let mut next_id = 0u64;
    for record in &outcome.series {
        if record.key.is_empty() {
            continue;
        }
        outcome.merged.push(MergedSeriesEntry {
            id: next_id,
            key: record.key.clone(),
            series: Some(record.clone()),
            reader: live_reader.iter().find(|e| e.key == record.key).map(|e| (*e).clone()),
            directory_chapter: directories
                .iter()
                .find(|d| d.key == record.key)
                .and_then(|d| d.last_chapter_seen),
        });
        next_id += 1;
    }
    for entry in &live_reader {
        if outcome.merged.iter().any(|m| m.key == entry.key) {
            continue;
        }
        outcome.merged.push(MergedSeriesEntry {
            id: next_id,
            key: entry.key.clone(),
            series: None,
            reader: Some((*entry).clone()),
            directory_chapter: directories
                .iter()
                .find(|d| d.key == entry.key)
                .and_then(|d| d.last_chapter_seen),
        });
        next_id += 1;
    }

    outcome
}

/// Normalize a merged chapter value for the remote service: integer >= 1.
fn outbound_chapter(chapter: Option<f64>) -> u32 {
    let value = chapter.unwrap_or(1.0);
    if value.is_nan() || value < 1.0 {
        1
    } else {
        value.floor() as u32
    }
}

/// Group updates into fixed-size blocks.
pub fn block_updates(updates: Vec<ChapterUpdate>) -> Vec<Vec<ChapterUpdate>> {
    updates
        .chunks(UPDATE_BLOCK_SIZE)
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Outcome of pushing update blocks upstream.
#[derive(Debug, Default)]
pub struct PushReport {
    pub submitted: usize,
    pub failed_blocks: usize,
}

/// Submit each block independently; a failed block is logged and does not
/// roll back or stop the others.
pub async fn push_updates(
    client: &ListClient,
    list_id: i64,
    blocks: Vec<Vec<ChapterUpdate>>,
) -> PushReport {
    let mut report = PushReport::default();

    for (index, block) in blocks.iter().enumerate() {
        match client.submit_chapter_updates(list_id, block).await {
            Ok(()) => report.submitted += block.len(),
            Err(e) => {
                tracing::warn!("Update block {} ({} entries) failed: {:#}", index, block.len(), e);
                report.failed_blocks += 1;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(series_id: i64, key: &str, chapter: f64) -> SeriesRecord {
        SeriesRecord {
            series_id: Some(series_id),
            key: key.to_string(),
            directory: key.to_string(),
            title: key.to_string(),
            chapter: Some(chapter),
            ..Default::default()
        }
    }

    fn reader_entry(key: &str, chapter: Option<f64>) -> ReaderRegistryEntry {
        ReaderRegistryEntry {
            key: key.to_string(),
            reader_series_id: format!("reader-{}", key),
            reader_title: key.to_string(),
            reader_chapter: chapter,
            ..Default::default()
        }
    }

    fn dir(key: &str) -> SeriesDirectory {
        SeriesDirectory {
            key: key.to_string(),
            name: key.to_string(),
            last_modified_at: Utc::now(),
            last_chapter_seen: Some(10.0),
        }
    }

    #[test]
    fn test_removed_orphan_display_id() {
        let linked = RemovedOrphan {
            series_id: Some(42),
            title: "Ghost".to_string(),
        };
        assert_eq!(linked.display_id(), "42");

        let reader_only = RemovedOrphan {
            series_id: None,
            title: "Ghost".to_string(),
        };
        assert_eq!(reader_only.display_id(), "unlinked");
    }

    #[test]
    fn test_chapter_emptiness_sentinel() {
        assert!(chapter_is_empty(None));
        assert!(chapter_is_empty(Some(0.0)));
        assert!(chapter_is_empty(Some(f64::NAN)));
        assert!(!chapter_is_empty(Some(0.5)));
        assert!(!chapter_is_empty(Some(3.0)));
    }

    #[test]
    fn test_empty_reader_keeps_record_at_one() {
        let mut rec = record(1, "k", 1.0);
        assert!(!merge_chapter_progress(&mut rec, Some(f64::NAN)));
        assert_eq!(rec.chapter, Some(1.0));
    }

    #[test]
    fn test_empty_reader_forces_record_to_one() {
        let mut rec = record(1, "k", 5.0);
        assert!(merge_chapter_progress(&mut rec, None));
        assert_eq!(rec.chapter, Some(1.0));

        let mut rec = record(1, "k", 5.0);
        assert!(merge_chapter_progress(&mut rec, Some(0.0)));
        assert_eq!(rec.chapter, Some(1.0));
    }

    #[test]
    fn test_reader_is_authoritative_at_floor_precision() {
        let mut rec = record(1, "k", 5.0);
        assert!(merge_chapter_progress(&mut rec, Some(12.5)));
        assert_eq!(rec.chapter, Some(12.0));

        // Equal floors: no redundant write.
        let mut rec = record(1, "k", 12.0);
        assert!(!merge_chapter_progress(&mut rec, Some(12.9)));
        assert_eq!(rec.chapter, Some(12.0));
    }

    #[test]
    fn test_fractional_reader_chapter_never_yields_zero() {
        let mut rec = record(1, "k", 5.0);
        assert!(merge_chapter_progress(&mut rec, Some(0.5)));
        assert_eq!(rec.chapter, Some(1.0));
    }

    #[test]
    fn test_orphan_reader_entry_is_dropped_and_cascades() {
        let series = vec![record(1, "ghost-series", 4.0), record(2, "alive", 2.0)];
        let reader = vec![
            reader_entry("ghost-series", Some(9.0)),
            reader_entry("alive", Some(2.0)),
        ];
        let dirs = vec![dir("alive")];

        let outcome = rebuild(&series, &reader, &dirs);

        assert_eq!(outcome.removed.len(), 1);
        assert_eq!(outcome.removed[0].series_id, Some(1));
        assert_eq!(outcome.removed[0].title, "ghost-series");
        assert!(outcome.series.iter().all(|r| r.key != "ghost-series"));
        assert!(outcome.merged.iter().all(|m| m.key != "ghost-series"));
    }

    #[test]
    fn test_rebuild_generates_dense_ids_and_updates() {
        let series = vec![record(1, "a", 5.0), record(2, "b", 3.0)];
        let reader = vec![reader_entry("a", Some(8.0))];
        let dirs = vec![dir("a"), dir("b"), dir("c")];

        let outcome = rebuild(&series, &reader, &dirs);

        let ids: Vec<u64> = outcome.merged.iter().map(|m| m.id).collect();
        assert_eq!(ids, (0..outcome.merged.len() as u64).collect::<Vec<_>>());

        // "a" advanced 5 -> 8; "b" had no reader progress and is pinned to 1.
        assert_eq!(
            outcome.updates,
            vec![
                ChapterUpdate { series_id: 1, chapter: 8, volume: None },
                ChapterUpdate { series_id: 2, chapter: 1, volume: None },
            ]
        );
    }

    #[test]
    fn test_block_updates_splits_at_block_size() {
        let updates: Vec<ChapterUpdate> = (0..(UPDATE_BLOCK_SIZE as i64 * 2 + 5))
            .map(|i| ChapterUpdate {
                series_id: i,
                chapter: 1,
                volume: None,
            })
            .collect();

        let blocks = block_updates(updates);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].len(), UPDATE_BLOCK_SIZE);
        assert_eq!(blocks[2].len(), 5);
    }
}
