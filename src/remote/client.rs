//! HTTP client for the reading-list service with retry/backoff

use anyhow::{bail, Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

use super::{CandidateSeries, ChapterUpdate, ReadingListEntry, SeriesDetail};

pub const DEFAULT_BASE_URL: &str = "https://api.mangaupdates.com/v1/";
const LIST_PAGE_SIZE: usize = 100;
const MAX_RETRIES: u32 = 5;
const BASE_RETRY_DELAY_MS: u64 = 2000;
const MAX_RETRY_DELAY_MS: u64 = 60000;

/// Client for the remote reading-list service.
///
/// Detail lookups are cached as JSON files under the cache directory; a
/// refresh flag on the lookup bypasses the cache.
#[derive(Clone)]
pub struct ListClient {
    client: Arc<reqwest::Client>,
    base_url: Url,
    cache_dir: PathBuf,
}

impl ListClient {
    pub fn new(base_url: &str, token: Option<&str>, cache_dir: PathBuf) -> Result<Self> {
        let base_url = Url::parse(base_url).context("Invalid service base URL")?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .context("Invalid API token")?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("mangamatch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client: Arc::new(client),
            base_url,
            cache_dir,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Invalid endpoint path: {}", path))
    }

    /// Fetch the full materialized reading list (paginated internally).
    pub async fn get_list_series(&self, list_id: i64) -> Result<Vec<ReadingListEntry>> {
        #[derive(Deserialize)]
        struct SeriesRefWire {
            id: i64,
            title: String,
            #[serde(default)]
            url: Option<String>,
        }

        #[derive(Deserialize)]
        struct StatusWire {
            #[serde(default)]
            chapter: Option<f64>,
            #[serde(default)]
            volume: Option<f64>,
        }

        #[derive(Deserialize)]
        struct ListItemWire {
            series: SeriesRefWire,
            #[serde(default)]
            status: Option<StatusWire>,
            #[serde(default)]
            user_rating: Option<f64>,
            #[serde(default)]
            latest_chapter: Option<f64>,
        }

        #[derive(Deserialize)]
        struct ListPageWire {
            #[serde(default)]
            total_items: Option<usize>,
            #[serde(default)]
            items: Vec<ListItemWire>,
        }

        let mut entries = Vec::new();
        let mut page = 1usize;

        loop {
            let url = self.endpoint(&format!(
                "lists/{}/items?page={}&perpage={}",
                list_id, page, LIST_PAGE_SIZE
            ))?;
            let response = self
                .execute_with_retry(self.client.get(url), "list items")
                .await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                bail!("List fetch failed ({}): {}", status, body);
            }

            let wire: ListPageWire = response
                .json()
                .await
                .context("Failed to parse reading-list page")?;

            let got = wire.items.len();
            for item in wire.items {
                let (chapter, volume) = item
                    .status
                    .map(|s| (s.chapter, s.volume))
                    .unwrap_or((None, None));
                entries.push(ReadingListEntry {
                    series_id: item.series.id,
                    title: item.series.title,
                    url: item.series.url.unwrap_or_default(),
                    chapter,
                    volume,
                    user_rating: item.user_rating,
                    latest_chapter_known: item.latest_chapter,
                });
            }

            let done = got < LIST_PAGE_SIZE
                || wire
                    .total_items
                    .map(|total| entries.len() >= total)
                    .unwrap_or(false);
            if done {
                break;
            }
            page += 1;
        }

        tracing::debug!("Fetched {} reading-list entries for list {}", entries.len(), list_id);
        Ok(entries)
    }

    /// Fetch full series metadata, using the on-disk cache unless `refresh`.
    ///
    /// Returns `Ok(None)` when the service has no record for the id.
    pub async fn get_series_detail(
        &self,
        series_id: i64,
        refresh: bool,
    ) -> Result<Option<SeriesDetail>> {
        let cache_file = self.cache_dir.join("series").join(format!("{}.json", series_id));

        if !refresh {
            if let Ok(content) = tokio::fs::read_to_string(&cache_file).await {
                match serde_json::from_str::<SeriesDetail>(&content) {
                    Ok(detail) => return Ok(Some(detail)),
                    Err(e) => {
                        tracing::warn!("Discarding corrupt detail cache for {}: {}", series_id, e);
                    }
                }
            }
        }

        let url = self.endpoint(&format!("series/{}", series_id))?;
        let response = self
            .execute_with_retry(self.client.get(url), "series detail")
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Series detail fetch failed ({}): {}", status, body);
        }

        let detail: SeriesDetail = response
            .json()
            .await
            .context("Failed to parse series detail")?;

        if let Some(parent) = cache_file.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!("Failed to create detail cache directory: {}", e);
            }
        }
        match serde_json::to_string_pretty(&detail) {
            Ok(content) => {
                if let Err(e) = tokio::fs::write(&cache_file, content).await {
                    tracing::warn!("Failed to cache detail for {}: {}", series_id, e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize detail cache for {}: {}", series_id, e),
        }

        Ok(Some(detail))
    }

    /// Search the remote catalog by title.
    pub async fn search_series(&self, query: &str) -> Result<Vec<CandidateSeries>> {
        #[derive(Serialize)]
        struct SearchRequest<'a> {
            search: &'a str,
        }

        #[derive(Deserialize)]
        struct SearchResponse {
            #[serde(default)]
            results: Vec<CandidateSeries>,
        }

        let url = self.endpoint("series/search")?;
        let response = self
            .execute_with_retry(
                self.client.post(url).json(&SearchRequest { search: query }),
                "series search",
            )
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Series search failed ({}): {}", status, body);
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .context("Failed to parse search response")?;
        Ok(parsed.results)
    }

    /// Submit one block of chapter updates for the list.
    pub async fn submit_chapter_updates(
        &self,
        list_id: i64,
        updates: &[ChapterUpdate],
    ) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let url = self.endpoint(&format!("lists/{}/items/update", list_id))?;
        let response = self
            .execute_with_retry(self.client.post(url).json(updates), "chapter updates")
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Chapter update submit failed ({}): {}", status, body);
        }

        tracing::debug!("Submitted {} chapter updates to list {}", updates.len(), list_id);
        Ok(())
    }

    /// Add series to the remote list.
    pub async fn add_series_to_list(&self, list_id: i64, series_ids: &[i64]) -> Result<()> {
        if series_ids.is_empty() {
            return Ok(());
        }

        #[derive(Serialize)]
        struct AddItem {
            series_id: i64,
        }

        let body: Vec<AddItem> = series_ids.iter().map(|&id| AddItem { series_id: id }).collect();
        let url = self.endpoint(&format!("lists/{}/items/add", list_id))?;
        let response = self
            .execute_with_retry(self.client.post(url).json(&body), "list add")
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("List add failed ({}): {}", status, text);
        }

        Ok(())
    }

    /// Send a request, retrying on 429/5xx with exponential backoff.
    ///
    /// Returns the response for any other status; callers decide how to
    /// treat client errors (e.g. 404 as "no data").
    async fn execute_with_retry(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<reqwest::Response> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let attempt_request = request
                .try_clone()
                .with_context(|| format!("Request for {} is not retryable", what))?;
            let response = attempt_request
                .send()
                .await
                .with_context(|| format!("Failed to send {} request", what))?;
            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                if attempt >= MAX_RETRIES {
                    bail!("Rate limited on {} after {} retries", what, MAX_RETRIES);
                }

                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(|secs| secs * 1000)
                    .unwrap_or_else(|| {
                        let base_delay = BASE_RETRY_DELAY_MS * (1 << (attempt - 1));
                        let jitter = (rand::random::<f64>() * 30.0 + 85.0) as u64; // 85-115%
                        (base_delay * jitter / 100).min(MAX_RETRY_DELAY_MS)
                    });

                tracing::warn!(
                    "Rate limited on {} (attempt {}/{}), retrying in {}ms",
                    what,
                    attempt,
                    MAX_RETRIES,
                    retry_after
                );
                sleep(Duration::from_millis(retry_after)).await;
                continue;
            }

            if status.is_server_error() {
                if attempt >= MAX_RETRIES {
                    bail!("Server error on {} after {} retries: {}", what, MAX_RETRIES, status);
                }

                let delay = (BASE_RETRY_DELAY_MS * (1 << (attempt - 1))).min(MAX_RETRY_DELAY_MS);
                tracing::warn!(
                    "Server error {} on {} (attempt {}/{}), retrying in {}ms",
                    status,
                    what,
                    attempt,
                    MAX_RETRIES,
                    delay
                );
                sleep(Duration::from_millis(delay)).await;
                continue;
            }

            return Ok(response);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_on_base() {
        let dir = tempfile::tempdir().unwrap();
        let client = ListClient::new(DEFAULT_BASE_URL, None, dir.path().to_path_buf()).unwrap();
        let url = client.endpoint("series/123").unwrap();
        assert_eq!(url.as_str(), "https://api.mangaupdates.com/v1/series/123");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ListClient::new("not a url", None, dir.path().to_path_buf()).is_err());
    }

    #[test]
    fn test_chapter_update_serializes_without_empty_volume() {
        let update = ChapterUpdate {
            series_id: 42,
            chapter: 7,
            volume: None,
        };
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"series_id":42,"chapter":7}"#);
    }
}
