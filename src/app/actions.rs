//! CLI command action handlers

use super::App;
use crate::library;
use crate::progress;
use crate::reader;
use crate::reconcile::{self, Reconciler, ResolveStatus, ReviewSelection};
use crate::store;

use anyhow::{bail, Result};

impl App {
    // ========== Sync ==========

    pub async fn cmd_sync(&self, refresh: bool, dry_run: bool) -> Result<()> {
        let list_id = self.config.list_id()?;
        let root = self.config.library_root()?;

        let mut series = self.load_series().await?;
        let mut queue = self.load_review().await?;
        let cached_dirs = self.load_directories().await?;

        println!("Scanning library: {}", root.display());
        let scan = library::scan_library(&root, &cached_dirs, self.config.sort_dirs_by_mtime)?;
        if scan.entries.is_empty() && !cached_dirs.is_empty() {
            bail!(
                "Library scan found no directories but the cached index has {}. \
                 Is the library mounted? Keeping the cached index.",
                cached_dirs.len()
            );
        }
        println!(
            "  {} directories ({} new, {} rescanned, {} gone)",
            scan.entries.len(),
            scan.added,
            scan.rescanned,
            scan.removed.len()
        );
        if !dry_run {
            self.save_directories(&scan.entries).await?;
        }

        println!("Fetching reading list {}...", list_id);
        let list = self.client.get_list_series(list_id).await?;
        println!("  {} entries", list.len());

        let engine = Reconciler::new(self.client.clone(), refresh);
        let report = reconcile::run_pass(&engine, &list, &scan.entries, &mut series, &mut queue).await;

        if dry_run {
            println!("Dry run: no changes written.");
        } else {
            self.save_series(&series).await?;
            self.save_review(&queue).await?;
        }

        println!("Sync Results");
        println!("{:-<60}", "");
        println!("Total entries:    {}", report.total);
        println!("Added:            {}", report.added);
        println!("Skipped (known):  {}", report.skipped);
        println!("Already in review:{}", report.in_review);
        println!("New for review:   {}", report.for_review);
        println!("Fetch failures:   {}", report.failed);
        if report.errors > 0 {
            println!("Malformed inputs: {}", report.errors);
        }
        if report.aborted {
            println!("Pass aborted early after repeated malformed entries.");
        }
        if report.for_review > 0 {
            println!("\nRun 'mangamatch review list' to resolve pending matches.");
        }
        Ok(())
    }

    // ========== Directory Index ==========

    pub async fn cmd_dirs_scan(&self) -> Result<()> {
        let root = self.config.library_root()?;
        let cached = self.load_directories().await?;

        println!("Scanning library: {}", root.display());
        let scan = library::scan_library(&root, &cached, self.config.sort_dirs_by_mtime)?;
        if scan.entries.is_empty() && !cached.is_empty() {
            bail!(
                "Scan found no directories but the cached index has {}. \
                 Is the library mounted? Keeping the cached index.",
                cached.len()
            );
        }
        self.save_directories(&scan.entries).await?;

        println!("Found {} directories:", scan.entries.len());
        println!("  New:       {}", scan.added);
        println!("  Rescanned: {}", scan.rescanned);
        if !scan.removed.is_empty() {
            println!("  Removed from index ({}):", scan.removed.len());
            for dir in &scan.removed {
                println!("    - {}", dir.name);
            }
        }
        Ok(())
    }

    pub async fn cmd_dirs_list(&self) -> Result<()> {
        let dirs = self.load_directories().await?;
        if dirs.is_empty() {
            println!("Directory index is empty. Run 'mangamatch dirs scan' first.");
            return Ok(());
        }

        println!("Indexed Directories ({}):", dirs.len());
        println!("{:-<60}", "");
        for dir in &dirs {
            let chapter = dir
                .last_chapter_seen
                .map(|c| format!("ch {}", c))
                .unwrap_or_else(|| "no chapters".to_string());
            println!(
                "  {} ({}, modified {})",
                dir.name,
                chapter,
                dir.last_modified_at.format("%Y-%m-%d")
            );
        }
        Ok(())
    }

    // ========== Review Queue ==========

    pub async fn cmd_review_list(&self) -> Result<()> {
        let queue = self.load_review().await?;
        if queue.is_empty() {
            println!("Review queue is empty.");
            return Ok(());
        }

        println!("Pending Review ({}):", queue.len());
        println!("{:-<60}", "");
        for entry in queue.entries() {
            println!("  [{}] {}", entry.series_id, entry.title);
            if entry.possible_directories.is_empty() {
                println!("      No candidate directories found.");
            } else {
                for (i, candidate) in entry.possible_directories.iter().enumerate() {
                    println!(
                        "      {}. {} ({})",
                        i + 1,
                        candidate.directory,
                        candidate.tier.as_str()
                    );
                }
            }
        }
        println!(
            "\nResolve with 'mangamatch review resolve <series-id> <choice>' \
             or discard with 'mangamatch review remove <series-id>'."
        );
        Ok(())
    }

    pub async fn cmd_review_resolve(&self, series_id: i64, choice: usize) -> Result<()> {
        let mut series = self.load_series().await?;
        let mut queue = self.load_review().await?;
        let directories = self.load_directories().await?;

        let entry = match queue.find(series_id) {
            Some(e) => e.clone(),
            None => bail!("Series {} is not in the review queue.", series_id),
        };

        if series.contains_series_id(series_id) {
            tracing::warn!(
                "Series {} already reconciled; leaving the queue entry alone",
                series_id
            );
            println!(
                "Series {} already has a reconciled record. Remove the queue entry with \
                 'mangamatch review remove {}' if it is stale.",
                series_id, series_id
            );
            return Ok(());
        }

        let candidate = match entry.possible_directories.get(choice.wrapping_sub(1)) {
            Some(c) if choice >= 1 => c,
            _ => bail!(
                "Choice {} is out of range (1..={}).",
                choice,
                entry.possible_directories.len()
            ),
        };
        let selection = ReviewSelection::from_candidate(candidate, &entry.title);

        // Replay the source entry through the engine with the human choice
        // attached; refresh so stale cached detail cannot taint the record.
        let engine = Reconciler::new(self.client.clone(), true);
        let outcome = engine
            .resolve(&entry.source_item, Some(&selection), &directories, &series, &queue)
            .await;

        let status = outcome.status;
        match reconcile::apply_resolution(series_id, outcome, &mut series, &mut queue)? {
            Some(record) => {
                // Series store first: a crash between the two writes leaves
                // a stale queue entry, never a lost record.
                self.save_series(&series).await?;
                self.save_review(&queue).await?;
                println!("Resolved: {} -> {}", record.title, record.directory);
            }
            None => match status {
                ResolveStatus::FailedGet => {
                    println!("Detail lookup failed for series {}; entry kept for retry.", series_id)
                }
                ResolveStatus::NoDetails => {
                    println!("No detail available for series {}; entry kept for retry.", series_id)
                }
                ResolveStatus::Skipped => {
                    println!("A record with this title already exists; nothing changed.")
                }
                other => {
                    println!("Resolution did not complete (status {:?}); entry kept.", other)
                }
            },
        }
        Ok(())
    }

    pub async fn cmd_review_remove(&self, series_id: i64) -> Result<()> {
        let mut queue = self.load_review().await?;
        if queue.remove(series_id) {
            self.save_review(&queue).await?;
            println!("Removed series {} from the review queue.", series_id);
        } else {
            println!("Series {} is not in the review queue.", series_id);
        }
        Ok(())
    }

    // ========== Progress Merge ==========

    pub async fn cmd_progress_merge(&self, push: bool, skip_push: bool) -> Result<()> {
        let mut series = self.load_series().await?;
        let directories = self.load_directories().await?;

        let reader_dir = match self.config.reader_dir() {
            Some(d) => d,
            None => bail!(
                "No reader directory configured. Run 'mangamatch config set-reader-dir <path>' first."
            ),
        };

        println!("Loading reader registry: {}", reader_dir.display());
        let registry = reader::load_registry(&reader_dir).await?;
        println!("  {} reader entries", registry.len());

        let outcome = progress::rebuild(series.records(), &registry, &directories);

        if !outcome.removed.is_empty() {
            println!("Removed orphaned reader entries ({}):", outcome.removed.len());
            for orphan in &outcome.removed {
                println!("  - {} ({})", orphan.title, orphan.display_id());
            }
        }

        store::save(&self.config.paths.merged_file(), &outcome.merged).await?;
        series.replace_all(outcome.series);
        self.save_series(&series).await?;

        println!("Merged view: {} entries", outcome.merged.len());
        println!("Chapter updates staged: {}", outcome.updates.len());

        if outcome.updates.is_empty() {
            return Ok(());
        }
        if skip_push || self.config.skip_progress_push {
            println!("Push skipped by configuration.");
            return Ok(());
        }
        if !push {
            println!("Re-run with --push to submit updates upstream.");
            return Ok(());
        }

        let list_id = self.config.list_id()?;
        let blocks = progress::block_updates(outcome.updates);
        let report = progress::push_updates(&self.client, list_id, blocks).await;
        println!("Submitted {} updates", report.submitted);
        if report.failed_blocks > 0 {
            println!("{} block(s) failed; re-run merge to retry.", report.failed_blocks);
        }
        Ok(())
    }

    // ========== Status / Config ==========

    pub async fn cmd_status(&self) -> Result<()> {
        let series = self.load_series().await?;
        let queue = self.load_review().await?;
        let dirs = self.load_directories().await?;

        println!("mangamatch Status");
        println!("{:-<60}", "");
        println!("Library root:   {}", self.config.library_root.as_deref().unwrap_or("(not set)"));
        println!("Reader dir:     {}", self.config.reader_dir.as_deref().unwrap_or("(not set)"));
        println!(
            "Reading list:   {}",
            self.config
                .list_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "(not set)".to_string())
        );
        println!("API token:      {}", if self.config.api_token.is_some() { "set" } else { "(not set)" });
        println!("Service URL:    {}", self.config.base_url());
        println!();
        println!("Series records: {}", series.len());
        println!("Pending review: {}", queue.len());
        println!("Indexed dirs:   {}", dirs.len());
        println!();
        println!("Data dir:       {}", self.config.paths.data_dir().display());
        println!("Cache dir:      {}", self.config.paths.cache_dir().display());
        Ok(())
    }

    pub fn cmd_config_show(&self) -> Result<()> {
        println!("Configuration ({})", self.config.paths.config_file().display());
        println!("{:-<60}", "");
        println!("library_root        = {}", self.config.library_root.as_deref().unwrap_or(""));
        println!("reader_dir          = {}", self.config.reader_dir.as_deref().unwrap_or(""));
        println!(
            "list_id             = {}",
            self.config
                .list_id
                .map(|id| id.to_string())
                .unwrap_or_default()
        );
        println!("api_token           = {}", if self.config.api_token.is_some() { "***" } else { "" });
        println!("api_base_url        = {}", self.config.api_base_url.as_deref().unwrap_or(""));
        println!("sort_dirs_by_mtime  = {}", self.config.sort_dirs_by_mtime);
        println!("skip_progress_push  = {}", self.config.skip_progress_push);
        Ok(())
    }

    pub async fn cmd_config_set_library(&mut self, path: &str) -> Result<()> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            bail!("Library path cannot be empty");
        }
        self.config.library_root = Some(trimmed.to_string());
        self.config.save().await?;
        println!("Library root set to: {}", trimmed);
        Ok(())
    }

    pub async fn cmd_config_set_reader_dir(&mut self, path: &str) -> Result<()> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            bail!("Reader directory cannot be empty");
        }
        self.config.reader_dir = Some(trimmed.to_string());
        self.config.save().await?;
        println!("Reader directory set to: {}", trimmed);
        Ok(())
    }

    pub async fn cmd_config_set_list(&mut self, list_id: i64) -> Result<()> {
        self.config.list_id = Some(list_id);
        self.config.save().await?;
        println!("Reading list set to: {}", list_id);
        Ok(())
    }

    pub async fn cmd_config_set_token(&mut self, token: &str) -> Result<()> {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            bail!("API token cannot be empty");
        }
        self.config.api_token = Some(trimmed.to_string());
        self.config.save().await?;
        println!("API token saved.");
        Ok(())
    }
}
