//! mangamatch - reconcile a remote manga reading list with a local library
//!
//! This crate keeps three views of a manga collection in agreement:
//! - A remote reading-list service (series ids, titles, chapter progress)
//! - A local library of per-series directories on disk
//! - A desktop reader's bookmark/chaptermark documents
//!
//! The reconciliation engine matches remote entries to local directories
//! by normalized title, escalating anything ambiguous to a human review
//! queue instead of guessing. The progress merger folds reader chapter
//! marks back into the reconciled records and submits the deltas upstream.

pub mod app;
pub mod config;
pub mod library;
pub mod matching;
pub mod normalize;
pub mod progress;
pub mod reader;
pub mod reconcile;
pub mod remote;
pub mod review;
pub mod series;
pub mod store;

pub use app::App;
pub use config::Config;
