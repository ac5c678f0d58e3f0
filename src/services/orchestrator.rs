//! The import loop.
//!
//! [`ImportRunner`] pages through the catalog one request at a time, maps
//! every record, persists the mapped ones in batches and, for full crawls,
//! checkpoints after each page. Cancellation is cooperative through a
//! [`CancellationToken`].

use crate::clients::{CatalogError, CatalogSource, FetchOutcome};
use crate::config::Config;
use crate::db::{Store, SyncTotals};
use crate::domain::{ContentKind, SortStrategy};
use crate::models::media::{Media, MediaPage};
use crate::models::title::TitleRecord;
use crate::services::mapper::{MapOutcome, MapperRules, SkipReason, map_media};
use crate::services::progress::{ProgressError, ProgressTracker};
use crate::services::upsert::TitleSink;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::fmt;
use std::ops::AddAssign;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Error messages kept in a [`RunSummary`]; later ones are only counted.
pub const MAX_REPORTED_ERRORS: usize = 5;

/// Look-back window of an incremental run with no recorded sync.
const DEFAULT_LOOKBACK_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Progress(#[from] ProgressError),

    #[error("Sync state error: {0}")]
    SyncState(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Walk the whole catalog, checkpointing after every page.
    FullCrawl { resume: bool, max_pages: u32 },
    /// Recently updated records only, newest first.
    Incremental {
        pages: u32,
        since: Option<DateTime<Utc>>,
    },
    /// Incremental run that records its completion in `sync_state`.
    Scheduled { pages: u32 },
    /// An explicit page window.
    Manual { start_page: u32, pages: u32 },
}

impl RunMode {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::FullCrawl { .. } => "full-crawl",
            Self::Incremental { .. } => "incremental",
            Self::Scheduled { .. } => "scheduled",
            Self::Manual { .. } => "manual",
        }
    }

    const fn is_incremental(&self) -> bool {
        matches!(self, Self::Incremental { .. } | Self::Scheduled { .. })
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPlan {
    pub kind: ContentKind,
    pub mode: RunMode,
    pub strategy: SortStrategy,
    pub per_page: u32,
}

impl RunPlan {
    /// Incremental modes always page newest-updated first.
    #[must_use]
    pub const fn effective_strategy(&self) -> SortStrategy {
        if self.mode.is_incremental() {
            SortStrategy::RecentlyUpdated
        } else {
            self.strategy
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportCounters {
    pub imported: u64,
    pub skipped: u64,
    pub errors: u64,
}

impl AddAssign for ImportCounters {
    fn add_assign(&mut self, rhs: Self) {
        self.imported += rhs.imported;
        self.skipped += rhs.skipped;
        self.errors += rhs.errors;
    }
}

impl From<ImportCounters> for SyncTotals {
    fn from(counters: ImportCounters) -> Self {
        Self {
            imported: counters.imported,
            skipped: counters.skipped,
            errors: counters.errors,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The catalog reported no further pages.
    Exhausted,
    /// The page budget or safety cap was reached.
    PageCap,
    Interrupted,
    /// An incremental page held nothing newer than the last sync.
    CaughtUp,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exhausted => "exhausted",
            Self::PageCap => "page cap reached",
            Self::Interrupted => "interrupted",
            Self::CaughtUp => "caught up",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Fetching(u32),
    Mapping,
    Persisting,
    Checkpointing,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Fetching(page) => write!(f, "fetching page {page}"),
            Self::Mapping => f.write_str("mapping"),
            Self::Persisting => f.write_str("persisting"),
            Self::Checkpointing => f.write_str("checkpointing"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub kind: ContentKind,
    pub mode: RunMode,
    pub stop_reason: StopReason,
    pub pages_processed: u32,
    /// Last fully processed page, 0 when none was.
    pub last_page: u32,
    pub total_pages: Option<u32>,
    /// Counts of this run only, not of earlier resumed runs.
    pub counters: ImportCounters,
    pub elapsed: Duration,
    pub errors: Vec<String>,
    pub suppressed_errors: u64,
}

impl RunSummary {
    #[must_use]
    pub const fn interrupted(&self) -> bool {
        matches!(self.stop_reason, StopReason::Interrupted)
    }
}

/// First few error messages of a run, plus a count of the rest.
#[derive(Debug, Default)]
struct ErrorLog {
    messages: Vec<String>,
    suppressed: u64,
}

impl ErrorLog {
    fn push(&mut self, message: String) {
        if self.messages.len() < MAX_REPORTED_ERRORS {
            self.messages.push(message);
        } else {
            self.suppressed += 1;
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub batch_size: usize,
    pub log_every_pages: u32,
    /// Pause between two page requests.
    pub page_delay: Duration,
    pub progress_dir: PathBuf,
    pub rules: MapperRules,
}

impl RunnerOptions {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.import.batch_size.max(1),
            log_every_pages: config.import.log_every_pages,
            page_delay: Duration::from_millis(config.catalog.request_delay_ms),
            progress_dir: PathBuf::from(&config.import.progress_dir),
            rules: MapperRules::new(&config.import.blocked_genres),
        }
    }
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Records of one page after mapping.
#[derive(Default)]
struct MappedPage {
    records: Vec<TitleRecord>,
    skipped: u64,
    /// Records newer than the incremental cut-off.
    fresh: usize,
}

pub struct ImportRunner<S, T> {
    source: S,
    sink: T,
    options: RunnerOptions,
    store: Option<Store>,
}

impl<S: CatalogSource, T: TitleSink> ImportRunner<S, T> {
    #[must_use]
    pub const fn new(source: S, sink: T, options: RunnerOptions) -> Self {
        Self {
            source,
            sink,
            options,
            store: None,
        }
    }

    /// Store used for the last-sync time of incremental and scheduled runs.
    #[must_use]
    pub fn with_store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub const fn options(&self) -> &RunnerOptions {
        &self.options
    }

    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    #[must_use]
    pub const fn sink(&self) -> &T {
        &self.sink
    }

    /// Runs one import pass.
    ///
    /// Mapping skips and failed batches are counted and never abort the run.
    /// An interrupt ends the run with [`StopReason::Interrupted`].
    ///
    /// # Errors
    ///
    /// - [`ImportError::Catalog`] when a page cannot be fetched
    /// - [`ImportError::Progress`] when the checkpoint cannot be read or written
    /// - [`ImportError::SyncState`] when the last sync time cannot be read or stored
    pub async fn run(
        &self,
        plan: &RunPlan,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, ImportError> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "import_run",
            %run_id,
            kind = %plan.kind,
            mode = plan.mode.label()
        );
        self.execute(plan, cancel).instrument(span).await
    }

    async fn execute(
        &self,
        plan: &RunPlan,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, ImportError> {
        let started = Instant::now();
        let started_at = Utc::now();
        let kind = plan.kind;
        let strategy = plan.effective_strategy();
        let tracker = ProgressTracker::for_kind(&self.options.progress_dir, kind);

        let mut baseline = ImportCounters::default();
        let mut total_pages = None;
        let mut since = None;

        let (start_page, last_allowed) = match plan.mode {
            RunMode::FullCrawl { resume, max_pages } => {
                let checkpoint = if resume {
                    tracker.load().await?
                } else {
                    tracker.clear().await?;
                    Default::default()
                };
                if checkpoint.last_page > 0 {
                    info!(
                        last_page = checkpoint.last_page,
                        total_pages = ?checkpoint.total_pages,
                        "Resuming crawl from checkpoint"
                    );
                }
                baseline = checkpoint.counters();
                total_pages = checkpoint.total_pages;
                (checkpoint.next_page(), max_pages)
            }
            RunMode::Incremental { pages, since: explicit } => {
                since = Some(self.resolve_since(kind, explicit).await?);
                (1, pages)
            }
            RunMode::Scheduled { pages } => {
                since = Some(self.resolve_since(kind, None).await?);
                (1, pages)
            }
            RunMode::Manual { start_page, pages } => {
                let start = start_page.max(1);
                (start, (start - 1).saturating_add(pages))
            }
        };

        info!(
            start_page,
            last_allowed,
            per_page = plan.per_page,
            strategy = ?strategy,
            since = ?since,
            "Starting import run"
        );

        let mut counters = ImportCounters::default();
        let mut errors = ErrorLog::default();
        let mut pages_processed = 0u32;
        let mut last_page = start_page - 1;
        let mut page = start_page;
        let mut phase = RunPhase::Idle;
        debug!(%phase, "Run phase");

        let stop_reason = loop {
            if cancel.is_cancelled() {
                break StopReason::Interrupted;
            }
            if page > last_allowed {
                break StopReason::PageCap;
            }

            if pages_processed > 0 && !self.options.page_delay.is_zero() {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break StopReason::Interrupted,
                    () = tokio::time::sleep(self.options.page_delay) => {}
                }
            }

            phase = RunPhase::Fetching(page);
            debug!(%phase, "Run phase");
            let Some(media_page) = self.fetch_with_retry(plan, strategy, page, cancel).await?
            else {
                break StopReason::Interrupted;
            };
            metrics::counter!("anisync_pages_fetched_total", "kind" => kind.as_str()).increment(1);

            total_pages = media_page.total_pages().or(total_pages);
            let exhausted = !media_page.page_info.has_next_page || media_page.media.is_empty();

            phase = RunPhase::Mapping;
            debug!(%phase, records = media_page.media.len(), "Run phase");
            let mapped = self.map_page(&media_page, kind, since);
            counters.skipped += mapped.skipped;
            metrics::counter!("anisync_titles_skipped_total", "kind" => kind.as_str())
                .increment(mapped.skipped);

            phase = RunPhase::Persisting;
            debug!(%phase, records = mapped.records.len(), "Run phase");
            self.persist(kind, page, &mapped.records, &mut counters, &mut errors)
                .await;

            last_page = page;
            pages_processed += 1;

            if matches!(plan.mode, RunMode::FullCrawl { .. }) {
                phase = RunPhase::Checkpointing;
                debug!(%phase, "Run phase");
                let mut cumulative = baseline;
                cumulative += counters;
                tracker.save(page, total_pages, &cumulative).await?;
            }

            if self.options.log_every_pages > 0
                && pages_processed % self.options.log_every_pages == 0
            {
                info!(
                    page,
                    total_pages = ?total_pages,
                    imported = counters.imported,
                    skipped = counters.skipped,
                    errors = counters.errors,
                    "Import progress"
                );
            }

            if exhausted {
                break StopReason::Exhausted;
            }
            if since.is_some() && !media_page.media.is_empty() && mapped.fresh == 0 {
                break StopReason::CaughtUp;
            }

            page += 1;
        };

        phase = RunPhase::Idle;
        debug!(%phase, "Run phase");

        match stop_reason {
            StopReason::Interrupted => {
                warn!(last_page, "Import interrupted, progress saved");
            }
            StopReason::Exhausted if matches!(plan.mode, RunMode::FullCrawl { .. }) => {
                tracker.clear().await?;
                info!("Catalog exhausted, checkpoint cleared");
            }
            _ => {}
        }

        if matches!(plan.mode, RunMode::Scheduled { .. })
            && let Some(store) = &self.store
        {
            if advances_watermark(stop_reason, &counters) {
                store
                    .record_sync(kind, started_at, counters.into())
                    .await
                    .map_err(|e| ImportError::SyncState(e.to_string()))?;
            } else {
                warn!(
                    %stop_reason,
                    errors = counters.errors,
                    "Scheduled run incomplete, keeping previous sync time"
                );
            }
        }

        let summary = RunSummary {
            kind,
            mode: plan.mode,
            stop_reason,
            pages_processed,
            last_page,
            total_pages,
            counters,
            elapsed: started.elapsed(),
            errors: errors.messages,
            suppressed_errors: errors.suppressed,
        };

        info!(
            stop_reason = %summary.stop_reason,
            pages = summary.pages_processed,
            imported = counters.imported,
            skipped = counters.skipped,
            errors = counters.errors,
            elapsed_ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
            "Import run finished"
        );

        Ok(summary)
    }

    async fn resolve_since(
        &self,
        kind: ContentKind,
        explicit: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>, ImportError> {
        if let Some(since) = explicit {
            return Ok(since);
        }

        if let Some(store) = &self.store
            && let Some(last) = store
                .last_synced_at(kind)
                .await
                .map_err(|e| ImportError::SyncState(e.to_string()))?
        {
            return Ok(last);
        }

        Ok(Utc::now() - ChronoDuration::hours(DEFAULT_LOOKBACK_HOURS))
    }

    /// Requests `page` until it is served, retrying after rate-limit cool-downs.
    ///
    /// Returns `None` when cancelled.
    async fn fetch_with_retry(
        &self,
        plan: &RunPlan,
        strategy: SortStrategy,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<MediaPage>, CatalogError> {
        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }

            // An in-flight request is left to finish; only the waits are cancellable.
            match self
                .source
                .fetch_page(plan.kind, page, plan.per_page, strategy)
                .await?
            {
                FetchOutcome::Page(media_page) => return Ok(Some(media_page)),
                FetchOutcome::RetryPage(cooldown) => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Ok(None),
                        () = tokio::time::sleep(cooldown) => {}
                    }
                    debug!(page, "Retrying page after rate limit cool-down");
                }
            }
        }
    }

    fn map_page(
        &self,
        media_page: &MediaPage,
        kind: ContentKind,
        since: Option<DateTime<Utc>>,
    ) -> MappedPage {
        let cutoff = since.map(|s| s.timestamp());
        let mut mapped = MappedPage::default();

        for media in &media_page.media {
            let stale = is_stale(media, cutoff);
            if !stale {
                mapped.fresh += 1;
            }

            let outcome = if stale {
                MapOutcome::Skipped(SkipReason::Unchanged)
            } else {
                map_media(media, kind, &self.options.rules)
            };

            match outcome {
                MapOutcome::Mapped(record) => mapped.records.push(*record),
                MapOutcome::Skipped(reason) => {
                    debug!(external_id = media.id, %reason, "Skipping record");
                    mapped.skipped += 1;
                }
            }
        }

        mapped
    }

    async fn persist(
        &self,
        kind: ContentKind,
        page: u32,
        records: &[TitleRecord],
        counters: &mut ImportCounters,
        errors: &mut ErrorLog,
    ) {
        for (index, batch) in records.chunks(self.options.batch_size.max(1)).enumerate() {
            match self.sink.persist_batch(batch).await {
                Ok(written) => {
                    let written = written as u64;
                    counters.imported += written;
                    metrics::counter!("anisync_titles_imported_total", "kind" => kind.as_str())
                        .increment(written);
                }
                Err(e) => {
                    let failed = batch.len() as u64;
                    counters.errors += failed;
                    metrics::counter!("anisync_batch_errors_total", "kind" => kind.as_str())
                        .increment(1);
                    warn!(page, batch = index, records = failed, error = %e, "Batch failed");
                    errors.push(format!("page {page} batch {index}: {e}"));
                }
            }
        }
    }
}

/// A scheduled run moves the sync time forward only when every record newer
/// than the previous sync was seen and stored.
const fn advances_watermark(stop_reason: StopReason, counters: &ImportCounters) -> bool {
    counters.errors == 0 && matches!(stop_reason, StopReason::Exhausted | StopReason::CaughtUp)
}

/// Whether an incremental run should leave the record alone. Records without
/// an update time are always imported.
fn is_stale(media: &Media, cutoff: Option<i64>) -> bool {
    match (cutoff, media.updated_at) {
        (Some(cutoff), Some(updated_at)) => updated_at <= cutoff,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_log_keeps_first_five() {
        let mut log = ErrorLog::default();
        for i in 0..8 {
            log.push(format!("error {i}"));
        }
        assert_eq!(log.messages.len(), MAX_REPORTED_ERRORS);
        assert_eq!(log.messages[0], "error 0");
        assert_eq!(log.suppressed, 3);
    }

    #[test]
    fn counters_accumulate() {
        let mut total = ImportCounters {
            imported: 5,
            skipped: 1,
            errors: 0,
        };
        total += ImportCounters {
            imported: 2,
            skipped: 0,
            errors: 10,
        };
        assert_eq!(
            total,
            ImportCounters {
                imported: 7,
                skipped: 1,
                errors: 10
            }
        );
    }

    #[test]
    fn incremental_plans_sort_by_update_time() {
        let plan = RunPlan {
            kind: ContentKind::Anime,
            mode: RunMode::Incremental {
                pages: 5,
                since: None,
            },
            strategy: SortStrategy::Popularity,
            per_page: 50,
        };
        assert_eq!(plan.effective_strategy(), SortStrategy::RecentlyUpdated);

        let plan = RunPlan {
            mode: RunMode::Manual {
                start_page: 1,
                pages: 1,
            },
            ..plan
        };
        assert_eq!(plan.effective_strategy(), SortStrategy::Popularity);
    }

    #[test]
    fn stale_check_needs_both_times() {
        let mut media = Media {
            id: 1,
            ..Default::default()
        };
        assert!(!is_stale(&media, Some(100)));

        media.updated_at = Some(100);
        assert!(is_stale(&media, Some(100)));
        assert!(!is_stale(&media, Some(99)));
        assert!(!is_stale(&media, None));
    }
}
