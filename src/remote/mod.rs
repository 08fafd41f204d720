//! Remote reading-list service boundary
//!
//! Everything the core needs from the tracking service: the materialized
//! reading list, per-series detail lookups (cached on disk), series search,
//! and the outbound update/add calls.

mod client;

pub use client::{ListClient, DEFAULT_BASE_URL};

use serde::{Deserialize, Serialize};

/// One entry of the remote reading list. Read-only to this core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadingListEntry {
    pub series_id: i64,
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub chapter: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub user_rating: Option<f64>,
    #[serde(default)]
    pub latest_chapter_known: Option<f64>,
}

/// Full series metadata from the remote detail lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeriesDetail {
    pub series_id: i64,
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub associated_titles: Vec<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, rename = "type")]
    pub series_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub latest_chapter: Option<f64>,
}

/// A search hit from the remote series search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSeries {
    pub series_id: i64,
    pub title: String,
    #[serde(default)]
    pub year: Option<String>,
}

/// One outbound chapter/volume update. The remote service rejects chapter
/// 0 and fractional chapters, so `chapter` is always an integer >= 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChapterUpdate {
    pub series_id: i64,
    pub chapter: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u32>,
}
