//! CLI module - Command-line interface for anisync
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use crate::domain::{KindSelection, SortStrategy};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

/// anisync - AniList catalog importer
/// Mirrors anime and manga titles into a local database
#[derive(Parser)]
#[command(name = "anisync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Crawl the whole catalog, resuming from the last checkpoint
    Crawl {
        /// Content kind: anime, manga or all
        #[arg(long)]
        kind: Option<KindSelection>,
        /// Records per page (1-50)
        #[arg(long)]
        per_page: Option<u32>,
        /// Stop after this page
        #[arg(long)]
        max_pages: Option<u32>,
        /// Ignore and discard any checkpoint
        #[arg(long)]
        fresh: bool,
        /// Catalog ordering: popularity, trending, score, recently-updated, id
        #[arg(long)]
        strategy: Option<SortStrategy>,
    },

    /// Import recently updated titles
    #[command(alias = "incremental")]
    Daily {
        #[arg(long)]
        kind: Option<KindSelection>,
        /// Number of pages to scan
        #[arg(long)]
        pages: Option<u32>,
        /// Only titles updated after this RFC 3339 time
        #[arg(long)]
        since: Option<DateTime<Utc>>,
    },

    /// Import an explicit page window
    Page {
        /// First page to import
        #[arg(long)]
        page: u32,
        /// Number of pages
        #[arg(long, default_value_t = 1)]
        pages: u32,
        #[arg(long)]
        kind: Option<KindSelection>,
        #[arg(long)]
        strategy: Option<SortStrategy>,
        #[arg(long)]
        per_page: Option<u32>,
    },

    /// Run scheduled imports in the background
    #[command(alias = "-d", alias = "--daemon")]
    Daemon {
        /// Six-field cron expression overriding the config
        #[arg(long)]
        cron: Option<String>,
        #[arg(long)]
        kind: Option<KindSelection>,
        /// Run one pass immediately before waiting for the schedule
        #[arg(long)]
        now: bool,
    },

    /// Show checkpoints, last syncs and title counts
    Status,

    /// Delete crawl checkpoints
    Reset {
        #[arg(long)]
        kind: Option<KindSelection>,
    },

    /// Create default config file
    #[command(alias = "--init")]
    Init,
}

pub use commands::*;
