//! Whole-document JSON stores
//!
//! Every logical store (series, review queue, directory index, merged
//! entries) is one JSON document read whole and written whole. Writes go
//! through a temp file + rename so a crash mid-write never truncates a
//! store. Callers serialize read-modify-write cycles at the call site.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tokio::fs;

/// Load a store document, returning the default value when the file does
/// not exist yet.
pub async fn load_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }

    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read store: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse store: {}", path.display()))
}

/// Persist a store document atomically (write temp, rename over).
pub async fn save<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create store directory: {}", parent.display()))?;
    }

    let content = serde_json::to_string_pretty(value).context("Failed to serialize store")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)
        .await
        .with_context(|| format!("Failed to write store: {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace store: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Doc {
        items: Vec<String>,
    }

    #[tokio::test]
    async fn test_missing_store_loads_default() {
        let dir = tempfile::tempdir().unwrap();
        let doc: Doc = load_or_default(&dir.path().join("nope.json")).await.unwrap();
        assert_eq!(doc, Doc::default());
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("doc.json");
        let doc = Doc {
            items: vec!["a".into(), "b".into()],
        };

        save(&path, &doc).await.unwrap();
        let loaded: Doc = load_or_default(&path).await.unwrap();
        assert_eq!(loaded, doc);
        // No temp file left behind.
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_store_is_an_error_not_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let result: Result<Doc> = load_or_default(&path).await;
        assert!(result.is_err());
    }
}
