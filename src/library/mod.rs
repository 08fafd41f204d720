//! Local series directory index
//!
//! Tracks the folders under the library root with mtime-based change
//! detection. A folder whose cached mtime still matches keeps its cached
//! latest-chapter value; new or touched folders get their filenames
//! rescanned for the highest chapter number.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::normalize::slug_key;

/// Synology-style recycle bin folders are never indexed.
pub const RECYCLE_DIR_NAME: &str = "#recycle";

/// One known series folder under the library root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesDirectory {
    /// Slug derived from `name`, never independently mutated.
    pub key: String,
    /// Raw folder name as it appears on disk.
    pub name: String,
    pub last_modified_at: DateTime<Utc>,
    /// Highest chapter number found in the folder's filenames.
    /// `None` means no parseable chapter, which is distinct from chapter 0.
    pub last_chapter_seen: Option<f64>,
}

/// Result of one library scan.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub entries: Vec<SeriesDirectory>,
    pub added: usize,
    pub rescanned: usize,
    /// Entries that were in the cached index but no longer exist on disk.
    pub removed: Vec<SeriesDirectory>,
}

/// Scan the library root, reusing cached entries whose mtime is unchanged.
///
/// A stat failure on one folder logs and skips it; an unreadable root is
/// fatal for the whole call. Callers holding a non-empty cached index must
/// treat a failure here as "try again later", not as an empty library.
pub fn scan_library(
    root: &Path,
    existing: &[SeriesDirectory],
    sort_by_mtime: bool,
) -> Result<ScanResult> {
    let read_dir = std::fs::read_dir(root)
        .with_context(|| format!("Failed to list library root: {}", root.display()))?;

    let mut result = ScanResult::default();
    let mut seen: Vec<String> = Vec::new();

    for dir_entry in read_dir {
        let dir_entry = match dir_entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Skipping unreadable library entry: {}", e);
                continue;
            }
        };

        let name = dir_entry.file_name().to_string_lossy().to_string();
        if name == RECYCLE_DIR_NAME {
            continue;
        }

        let metadata = match dir_entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!("Failed to stat {}: {}", name, e);
                continue;
            }
        };
        if !metadata.is_dir() {
            continue;
        }

        let mtime: DateTime<Utc> = match metadata.modified() {
            Ok(t) => t.into(),
            Err(e) => {
                tracing::warn!("No modification time for {}: {}", name, e);
                continue;
            }
        };

        seen.push(name.clone());

        let cached = existing.iter().find(|d| d.name == name);
        match cached {
            Some(prev) if prev.last_modified_at == mtime => {
                // Unchanged: keep the cached chapter value.
                result.entries.push(prev.clone());
            }
            other => {
                let last_chapter_seen = latest_chapter_in(&dir_entry.path());
                if other.is_none() {
                    result.added += 1;
                } else {
                    result.rescanned += 1;
                }
                result.entries.push(SeriesDirectory {
                    key: slug_key(&name),
                    name,
                    last_modified_at: mtime,
                    last_chapter_seen,
                });
            }
        }
    }

    for prev in existing {
        if !seen.contains(&prev.name) {
            tracing::info!("Directory removed from library: {}", prev.name);
            result.removed.push(prev.clone());
        }
    }

    if sort_by_mtime {
        result
            .entries
            .sort_by(|a, b| b.last_modified_at.cmp(&a.last_modified_at));
    }

    Ok(result)
}

/// Highest chapter number across the filenames in one folder.
pub fn latest_chapter_in(dir: &Path) -> Option<f64> {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            tracing::warn!("Failed to list {}: {}", dir.display(), e);
            return None;
        }
    };

    let mut latest: Option<f64> = None;
    for file in read_dir.flatten() {
        let name = file.file_name().to_string_lossy().to_string();
        if let Some(chapter) = extract_chapter(&name) {
            latest = Some(latest.map_or(chapter, |cur: f64| cur.max(chapter)));
        }
    }
    latest
}

/// File extensions stripped before the bare-numeric fallback.
const ARCHIVE_EXTENSIONS: &[&str] = &[
    "cbz", "cbr", "cb7", "zip", "rar", "7z", "pdf", "epub", "jpg", "jpeg", "png", "webp",
];

static CHAPTER_RE: std::sync::OnceLock<regex_lite::Regex> = std::sync::OnceLock::new();

/// Pull a chapter number out of a filename.
///
/// Recognizes `Vol. 2 Ch. 15`, `v2c15`, `Chapter 15`, `Ch 15.5` and, as a
/// fallback, a bare numeric stem like `015`. Inputs without a file
/// extension (e.g. a reader's chaptermark title `Ch. 45`) parse the same
/// way: the pattern runs on the full name, so a dot after the chapter
/// marker is never mistaken for an extension.
pub fn extract_chapter(filename: &str) -> Option<f64> {
    let re = CHAPTER_RE.get_or_init(|| {
        regex_lite::Regex::new(
            r"(?i)(?:v(?:ol(?:ume)?)?\.?\s*\d+[\s._-]*)?c(?:h(?:apter)?)?\.?\s*(\d+(?:\.\d+)?)",
        )
        .unwrap()
    });

    if let Some(caps) = re.captures(filename) {
        if let Ok(n) = caps[1].parse::<f64>() {
            return Some(n);
        }
    }

    // Bare numeric stem, e.g. "015.cbz" or "15.5".
    let stem = match filename.rsplit_once('.') {
        Some((s, ext)) if ARCHIVE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => s,
        _ => filename,
    };
    let trimmed = stem.trim();
    if !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.')
        && trimmed.chars().any(|c| c.is_ascii_digit())
    {
        return trimmed.parse::<f64>().ok();
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_extract_chapter_patterns() {
        assert_eq!(extract_chapter("Vol. 2 Ch. 15.cbz"), Some(15.0));
        assert_eq!(extract_chapter("v2c15.zip"), Some(15.0));
        assert_eq!(extract_chapter("Chapter 15.cbz"), Some(15.0));
        assert_eq!(extract_chapter("Ch 15.5.cbz"), Some(15.5));
        assert_eq!(extract_chapter("015.cbz"), Some(15.0));
        assert_eq!(extract_chapter("One Piece - Chapter 1044 (digital).cbz"), Some(1044.0));
    }

    #[test]
    fn test_extract_chapter_without_file_extension() {
        // Chaptermark titles arrive without an extension; a dot after the
        // chapter marker must not be treated as one.
        assert_eq!(extract_chapter("Ch. 45"), Some(45.0));
        assert_eq!(extract_chapter("Vol. 2 Ch. 15"), Some(15.0));
        assert_eq!(extract_chapter("Chapter 1044"), Some(1044.0));
        assert_eq!(extract_chapter("15.5"), Some(15.5));
    }

    #[test]
    fn test_extract_chapter_rejects_non_chapters() {
        assert_eq!(extract_chapter("cover.jpg"), None);
        assert_eq!(extract_chapter("credits"), None);
        assert_eq!(extract_chapter("omake page"), None);
    }

    #[test]
    fn test_chapter_zero_is_valid() {
        assert_eq!(extract_chapter("Chapter 0.cbz"), Some(0.0));
    }

    #[test]
    fn test_scan_indexes_directories() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("One Piece")).unwrap();
        fs::write(root.path().join("One Piece").join("Chapter 12.cbz"), b"x").unwrap();
        fs::create_dir(root.path().join(RECYCLE_DIR_NAME)).unwrap();
        fs::write(root.path().join("stray-file.txt"), b"x").unwrap();

        let result = scan_library(root.path(), &[], false).unwrap();
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.added, 1);
        let entry = &result.entries[0];
        assert_eq!(entry.name, "One Piece");
        assert_eq!(entry.key, "one-piece");
        assert_eq!(entry.last_chapter_seen, Some(12.0));
    }

    #[test]
    fn test_scan_keeps_cached_value_when_unmodified() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("Berserk")).unwrap();

        let first = scan_library(root.path(), &[], false).unwrap();
        assert_eq!(first.entries.len(), 1);

        // Second scan with an unchanged mtime must not count as a rescan.
        let second = scan_library(root.path(), &first.entries, false).unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.rescanned, 0);
        assert_eq!(second.entries, first.entries);
    }

    #[test]
    fn test_scan_reports_removed_directories() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("Kept")).unwrap();

        let cached = vec![
            SeriesDirectory {
                key: "kept".into(),
                name: "Kept".into(),
                last_modified_at: Utc::now(),
                last_chapter_seen: None,
            },
            SeriesDirectory {
                key: "gone".into(),
                name: "Gone".into(),
                last_modified_at: Utc::now(),
                last_chapter_seen: Some(3.0),
            },
        ];

        let result = scan_library(root.path(), &cached, false).unwrap();
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.removed.len(), 1);
        assert_eq!(result.removed[0].name, "Gone");
    }

    #[test]
    fn test_scan_unreadable_root_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let missing = root.path().join("does-not-exist");
        assert!(scan_library(&missing, &[], false).is_err());
    }

    #[test]
    fn test_no_parseable_chapter_is_unknown_not_zero() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("Artbook Collection");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("cover.jpg"), b"x").unwrap();

        let result = scan_library(root.path(), &[], false).unwrap();
        assert_eq!(result.entries[0].last_chapter_seen, None);
    }
}
