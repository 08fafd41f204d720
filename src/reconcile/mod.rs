//! Reconciliation engine
//!
//! For each remote reading-list entry, decide which local directory (if
//! any) it corresponds to. An exact slug match confirms on its own;
//! every similarity- or alternate-title-derived match goes to the review
//! queue with all candidates attached, never auto-picked.

use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use uuid::Uuid;

use crate::library::SeriesDirectory;
use crate::matching::{within_associated_band, within_direct_band, MatchConfidence};
use crate::normalize::{normalize, slug_key};
use crate::remote::{ListClient, ReadingListEntry, SeriesDetail};
use crate::review::{AssociatedTitle, CandidateMatch, ReviewEntry, ReviewQueue};
use crate::series::{SeriesRecord, SeriesStore};

/// Remote calls per concurrent batch during a pass.
pub const REMOTE_BATCH_SIZE: usize = 5;
/// Cooperative throttle between batches.
pub const BATCH_DELAY: Duration = Duration::from_secs(1);
/// A pass aborts once this many malformed-entry errors accumulate.
pub const MAX_RUN_ERRORS: usize = 2;

/// Exhaustive outcome classification for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStatus {
    /// A record with this title already exists locally.
    Skipped,
    /// Already queued for review and no human selection was supplied.
    InReview,
    /// The remote detail lookup errored (retryable).
    FailedGet,
    /// The remote detail lookup returned no data (retryable).
    NoDetails,
    /// No confident match; a review entry was produced.
    ForReview,
    /// A confirmed record was produced.
    Success,
    /// Malformed input; counts toward the run abort threshold.
    Error,
}

/// Result of resolving one entry: the status plus whichever artifact the
/// status implies (a record for `Success`, a review entry for `ForReview`).
#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub status: ResolveStatus,
    pub record: Option<SeriesRecord>,
    pub review: Option<ReviewEntry>,
}

impl ResolveOutcome {
    fn status(status: ResolveStatus) -> Self {
        Self {
            status,
            record: None,
            review: None,
        }
    }
}

/// A human's choice from the review queue, forcing the matched-directory
/// path through the engine.
#[derive(Debug, Clone)]
pub struct ReviewSelection {
    /// Raw folder name the user picked.
    pub directory: String,
    /// Tier carried over from the chosen candidate.
    pub confidence: MatchConfidence,
    /// Optional title override when the folder name differs from the
    /// remote title.
    pub alias: Option<String>,
}

impl ReviewSelection {
    pub fn from_candidate(candidate: &CandidateMatch, remote_title: &str) -> Self {
        let alias = if candidate.title != remote_title {
            Some(candidate.title.clone())
        } else {
            None
        };
        Self {
            directory: candidate.directory.clone(),
            confidence: candidate.tier,
            alias,
        }
    }
}

/// Summary of one reconciliation pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub total: usize,
    pub added: usize,
    pub skipped: usize,
    pub in_review: usize,
    pub for_review: usize,
    pub failed: usize,
    pub errors: usize,
    pub aborted: bool,
}

/// The reconciliation engine. Holds the remote client; all store state is
/// passed in as read-only snapshots and returned as new records.
pub struct Reconciler {
    client: ListClient,
    refresh: bool,
}

impl Reconciler {
    pub fn new(client: ListClient, refresh: bool) -> Self {
        Self { client, refresh }
    }

    /// Resolve one reading-list entry against the directory index.
    pub async fn resolve(
        &self,
        item: &ReadingListEntry,
        selection: Option<&ReviewSelection>,
        directories: &[SeriesDirectory],
        series: &SeriesStore,
        review: &ReviewQueue,
    ) -> ResolveOutcome {
        if !validate(item) {
            tracing::warn!(
                "Malformed reading-list entry (id {}, title {:?})",
                item.series_id,
                item.title
            );
            return ResolveOutcome::status(ResolveStatus::Error);
        }

        if let Some(status) = precheck(item, series, review, selection.is_some()) {
            return ResolveOutcome::status(status);
        }

        let detail = match self.client.get_series_detail(item.series_id, self.refresh).await {
            Ok(Some(detail)) => detail,
            Ok(None) => {
                tracing::warn!("No remote details for series {} ({})", item.series_id, item.title);
                return ResolveOutcome::status(ResolveStatus::NoDetails);
            }
            Err(e) => {
                tracing::warn!("Detail fetch failed for series {}: {:#}", item.series_id, e);
                return ResolveOutcome::status(ResolveStatus::FailedGet);
            }
        };

        resolve_with_detail(item, &detail, selection, directories)
    }
}

/// Required remote-entry fields.
pub fn validate(item: &ReadingListEntry) -> bool {
    item.series_id > 0 && !item.title.trim().is_empty()
}

/// Check whether the entry is already handled: a local record with the
/// same title, or a pending review entry (unless a human is resolving it).
pub fn precheck(
    item: &ReadingListEntry,
    series: &SeriesStore,
    review: &ReviewQueue,
    has_selection: bool,
) -> Option<ResolveStatus> {
    if series.find_by_title_key(&slug_key(&item.title)).is_some() {
        return Some(ResolveStatus::Skipped);
    }

    if !has_selection {
        if let Some(pending) = review.find(item.series_id) {
            if pending.title != item.title {
                // Remote-side rename while in review: keep the stored entry.
                tracing::debug!(
                    "Series {} renamed remotely ({:?} -> {:?}) while in review",
                    item.series_id,
                    pending.title,
                    item.title
                );
            }
            return Some(ResolveStatus::InReview);
        }
    }

    None
}

/// The matching core, pure over its inputs.
///
/// An exact slug match of the subject (the user-selected directory, or
/// the remote title) takes absolute precedence. Everything else collects
/// candidates and forces review; multiple hits are all surfaced, never
/// tie-broken here.
pub fn resolve_with_detail(
    item: &ReadingListEntry,
    detail: &SeriesDetail,
    selection: Option<&ReviewSelection>,
    directories: &[SeriesDirectory],
) -> ResolveOutcome {
    let associated: Vec<AssociatedTitle> = detail
        .associated_titles
        .iter()
        .map(|t| AssociatedTitle {
            title: t.clone(),
            key: slug_key(t),
        })
        .collect();

    let subject_key = match selection {
        Some(sel) => slug_key(&sel.directory),
        None => slug_key(&item.title),
    };

    let mut candidates: Vec<CandidateMatch> = Vec::new();
    let mut matched_dir: Option<&SeriesDirectory> = None;
    let mut pending = false;

    let confidence = if let Some(dir) = directories.iter().find(|d| d.key == subject_key) {
        matched_dir = Some(dir);
        selection
            .map(|s| s.confidence)
            .unwrap_or(MatchConfidence::TitleMatch)
    } else {
        let title_key = slug_key(&item.title);

        for dir in directories {
            if within_direct_band(&title_key, &dir.key) {
                candidates.push(candidate(MatchConfidence::TitleSimilar, &item.title, dir));
            }
        }

        if candidates.is_empty() {
            for assoc in &associated {
                for dir in directories {
                    if assoc.key == dir.key {
                        candidates.push(candidate(
                            MatchConfidence::AssociatedTitle,
                            &assoc.title,
                            dir,
                        ));
                    }
                }
            }
        }

        if candidates.is_empty() {
            // Fuzzy hits on the same directory from different alternate
            // titles are all kept; the reviewer sees every derivation.
            for assoc in &associated {
                for dir in directories {
                    if within_associated_band(&assoc.key, &dir.key) {
                        candidates.push(candidate(
                            MatchConfidence::AssociatedTitleSimilar,
                            &assoc.title,
                            dir,
                        ));
                    }
                }
            }
        }

        pending = true;
        if candidates.is_empty() {
            tracing::info!(
                "No directory match for series {} ({})",
                item.series_id,
                item.title
            );
        }
        candidates
            .first()
            .map(|c| c.tier)
            .unwrap_or(MatchConfidence::NoMatch)
    };

    let mut draft = SeriesRecord {
        key: String::new(),
        series_id: Some(item.series_id),
        title: if detail.title.is_empty() {
            item.title.clone()
        } else {
            detail.title.clone()
        },
        url: if detail.url.is_empty() {
            item.url.clone()
        } else {
            detail.url.clone()
        },
        chapter: item.chapter,
        volume: item.volume,
        user_rating: item.user_rating,
        latest_chapter_known: item.latest_chapter_known.or(detail.latest_chapter),
        // Stale associated titles are worse than none; a pending entry
        // gets them re-fetched on resolution.
        associated_titles: if pending {
            Vec::new()
        } else {
            detail.associated_titles.clone()
        },
        directory: String::new(),
        alias: selection.and_then(|s| s.alias.clone()),
        match_confidence: confidence,
        year: detail.year.clone(),
        completed: detail.completed,
        series_type: detail.series_type.clone(),
        status: detail.status.clone(),
        updated_at: Utc::now().to_rfc3339(),
    };

    if let Some(dir) = matched_dir {
        draft.set_directory(&dir.name);
    }

    if matched_dir.is_some() && !pending {
        return ResolveOutcome {
            status: ResolveStatus::Success,
            record: Some(draft),
            review: None,
        };
    }

    ResolveOutcome {
        status: ResolveStatus::ForReview,
        record: None,
        review: Some(ReviewEntry {
            series_id: item.series_id,
            title: item.title.clone(),
            normalized_title: normalize(&item.title),
            associated_titles: associated,
            possible_directories: candidates,
            draft,
            source_item: item.clone(),
            created_at: Utc::now().to_rfc3339(),
        }),
    }
}

fn candidate(tier: MatchConfidence, title: &str, dir: &SeriesDirectory) -> CandidateMatch {
    CandidateMatch {
        tier,
        title: title.to_string(),
        normalized_title: normalize(title),
        directory: dir.name.clone(),
        key: dir.key.clone(),
    }
}

/// Apply a human resolution outcome to the in-memory stores.
///
/// Only `Success` mutates anything, and in a fixed order: the record is
/// appended first, the queue entry removed second. If the append is
/// rejected (duplicate series id) the queue entry stays put, so no
/// interruption or conflict can lose a queued series. Returns the applied
/// record, or `None` when the outcome left the stores untouched.
pub fn apply_resolution(
    series_id: i64,
    outcome: ResolveOutcome,
    series: &mut SeriesStore,
    queue: &mut ReviewQueue,
) -> Result<Option<SeriesRecord>> {
    if outcome.status != ResolveStatus::Success {
        return Ok(None);
    }

    let record = outcome
        .record
        .ok_or_else(|| anyhow!("Success outcome without a record for series {}", series_id))?;
    series.add(record.clone())?;
    queue.remove(series_id);
    Ok(Some(record))
}

/// Run the engine over the whole reading list in throttled batches.
///
/// Confirmed records and new review entries are applied to the in-memory
/// stores; the caller owns persistence. Aborts early once the error
/// threshold is hit so a broken upstream is not hammered.
pub async fn run_pass(
    engine: &Reconciler,
    list: &[ReadingListEntry],
    directories: &[SeriesDirectory],
    series: &mut SeriesStore,
    queue: &mut ReviewQueue,
) -> SyncReport {
    let run_id = Uuid::new_v4();
    tracing::info!(
        "Reconciliation pass {} over {} reading-list entries",
        run_id,
        list.len()
    );

    let mut report = SyncReport {
        total: list.len(),
        ..Default::default()
    };

    for (chunk_index, chunk) in list.chunks(REMOTE_BATCH_SIZE).enumerate() {
        if chunk_index > 0 {
            tokio::time::sleep(BATCH_DELAY).await;
        }

        let outcomes = {
            let series_snapshot: &SeriesStore = series;
            let queue_snapshot: &ReviewQueue = queue;
            futures::future::join_all(chunk.iter().map(|item| {
                engine.resolve(item, None, directories, series_snapshot, queue_snapshot)
            }))
            .await
        };

        for (item, outcome) in chunk.iter().zip(outcomes) {
            match outcome.status {
                ResolveStatus::Success => match outcome.record {
                    Some(record) => match series.add(record) {
                        Ok(()) => report.added += 1,
                        Err(e) => {
                            tracing::warn!("Rejected record for {}: {}", item.title, e);
                            report.skipped += 1;
                        }
                    },
                    None => {
                        tracing::error!("Success outcome without a record for {}", item.title);
                        report.errors += 1;
                    }
                },
                ResolveStatus::ForReview => match outcome.review {
                    Some(entry) => {
                        if queue.push_unique(entry) {
                            report.for_review += 1;
                        } else {
                            report.in_review += 1;
                        }
                    }
                    None => {
                        tracing::error!("ForReview outcome without an entry for {}", item.title);
                        report.errors += 1;
                    }
                },
                ResolveStatus::Skipped => report.skipped += 1,
                ResolveStatus::InReview => report.in_review += 1,
                ResolveStatus::FailedGet | ResolveStatus::NoDetails => report.failed += 1,
                ResolveStatus::Error => report.errors += 1,
            }

            if report.errors >= MAX_RUN_ERRORS {
                tracing::error!(
                    "Aborting pass {} after {} errors ({} of {} entries processed)",
                    run_id,
                    report.errors,
                    report.added + report.skipped + report.in_review + report.for_review + report.failed,
                    report.total
                );
                report.aborted = true;
                return report;
            }
        }
    }

    report
}
