//! Reader registry source
//!
//! The chapter reader keeps two flat documents: a bookmarks list (which
//! series are tracked, per connector) and a chaptermarks list (which
//! chapter is currently open). Joined on `(manga_id, connector_id)` they
//! become one registry entry per tracked series.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::library::extract_chapter;
use crate::normalize::{normalize, slug_key};

pub const BOOKMARKS_FILE: &str = "bookmarks.json";
pub const CHAPTERMARKS_FILE: &str = "chaptermarks.json";

/// Reading progress for one series as the reader application sees it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReaderRegistryEntry {
    /// Slug key shared with the directory index and series store.
    pub key: String,
    pub reader_series_id: String,
    pub reader_connector_id: String,
    pub reader_title: String,
    pub folder_name: String,
    pub image_available: bool,
    pub last_chapter_in_folder: Option<f64>,
    /// Chapter currently open in the reader. Authoritative once set.
    pub reader_chapter: Option<f64>,
    pub last_modified_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Bookmark {
    pub key: BookmarkKey,
    pub title: BookmarkTitle,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookmarkKey {
    pub manga: String,
    pub connector: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookmarkTitle {
    pub manga: String,
    pub connector: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChapterMark {
    #[serde(rename = "mangaID")]
    pub manga_id: String,
    #[serde(rename = "connectorID")]
    pub connector_id: String,
    #[serde(rename = "chapterID")]
    pub chapter_id: String,
    #[serde(rename = "chapterTitle")]
    pub chapter_title: String,
}

/// Load both reader documents from the reader profile directory and join
/// them into registry entries.
pub async fn load_registry(reader_dir: &Path) -> Result<Vec<ReaderRegistryEntry>> {
    let bookmarks_path = reader_dir.join(BOOKMARKS_FILE);
    let chaptermarks_path = reader_dir.join(CHAPTERMARKS_FILE);

    let bookmarks: Vec<Bookmark> = read_document(&bookmarks_path).await?;
    let chaptermarks: Vec<ChapterMark> = read_document(&chaptermarks_path).await?;

    Ok(join_registry(&bookmarks, &chaptermarks))
}

async fn read_document<T>(path: &Path) -> Result<Vec<T>>
where
    T: serde::de::DeserializeOwned,
{
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read reader document: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse reader document: {}", path.display()))
}

/// Join bookmarks and chaptermarks on `(manga_id, connector_id)`.
///
/// A bookmark without a chaptermark still yields an entry, with the
/// chapter left unknown (the reader tracks it but nothing is open).
pub fn join_registry(bookmarks: &[Bookmark], chaptermarks: &[ChapterMark]) -> Vec<ReaderRegistryEntry> {
    bookmarks
        .iter()
        .map(|bookmark| {
            let mark = chaptermarks.iter().find(|m| {
                m.manga_id == bookmark.key.manga && m.connector_id == bookmark.key.connector
            });
            let reader_chapter = mark.and_then(|m| extract_chapter(&m.chapter_title));

            ReaderRegistryEntry {
                key: slug_key(&bookmark.title.manga),
                reader_series_id: bookmark.key.manga.clone(),
                reader_connector_id: bookmark.key.connector.clone(),
                reader_title: bookmark.title.manga.clone(),
                folder_name: normalize(&bookmark.title.manga),
                image_available: false,
                last_chapter_in_folder: None,
                reader_chapter,
                last_modified_at: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bookmark(manga: &str, connector: &str, title: &str) -> Bookmark {
        Bookmark {
            key: BookmarkKey {
                manga: manga.to_string(),
                connector: connector.to_string(),
            },
            title: BookmarkTitle {
                manga: title.to_string(),
                connector: connector.to_string(),
            },
        }
    }

    #[test]
    fn test_join_on_manga_and_connector() {
        let bookmarks = vec![
            bookmark("op-123", "mangadex", "One Piece"),
            bookmark("brk-9", "mangadex", "Berserk"),
        ];
        let chaptermarks = vec![ChapterMark {
            manga_id: "op-123".to_string(),
            connector_id: "mangadex".to_string(),
            chapter_id: "ch-1044".to_string(),
            chapter_title: "Chapter 1044".to_string(),
        }];

        let entries = join_registry(&bookmarks, &chaptermarks);
        assert_eq!(entries.len(), 2);

        let one_piece = entries.iter().find(|e| e.key == "one-piece").unwrap();
        assert_eq!(one_piece.reader_chapter, Some(1044.0));
        assert_eq!(one_piece.folder_name, "One Piece");

        let berserk = entries.iter().find(|e| e.key == "berserk").unwrap();
        assert_eq!(berserk.reader_chapter, None);
    }

    #[test]
    fn test_connector_mismatch_does_not_join() {
        let bookmarks = vec![bookmark("op-123", "mangadex", "One Piece")];
        let chaptermarks = vec![ChapterMark {
            manga_id: "op-123".to_string(),
            connector_id: "other-source".to_string(),
            chapter_id: "c1".to_string(),
            chapter_title: "Chapter 99".to_string(),
        }];

        let entries = join_registry(&bookmarks, &chaptermarks);
        assert_eq!(entries[0].reader_chapter, None);
    }

    #[tokio::test]
    async fn test_load_registry_from_documents() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join(BOOKMARKS_FILE),
            r#"[{"key":{"manga":"m1","connector":"c1"},"title":{"manga":"Dr. STONE","connector":"site"}}]"#,
        )
        .await
        .unwrap();
        tokio::fs::write(
            dir.path().join(CHAPTERMARKS_FILE),
            r#"[{"mangaID":"m1","connectorID":"c1","chapterID":"x","chapterTitle":"Ch. 45"}]"#,
        )
        .await
        .unwrap();

        let entries = load_registry(dir.path()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "dr-stone");
        assert_eq!(entries[0].reader_chapter, Some(45.0));
    }

    #[tokio::test]
    async fn test_missing_documents_yield_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let entries = load_registry(dir.path()).await.unwrap();
        assert!(entries.is_empty());
    }
}
