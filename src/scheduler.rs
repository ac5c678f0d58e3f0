use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::clients::CatalogSource;
use crate::config::SchedulerConfig;
use crate::domain::{ContentKind, SortStrategy};
use crate::services::orchestrator::{ImportRunner, RunMode, RunPlan, RunSummary};
use crate::services::upsert::TitleSink;

/// What every scheduled pass imports.
#[derive(Debug, Clone)]
pub struct ScheduledImport {
    pub kinds: Vec<ContentKind>,
    pub pages: u32,
    pub per_page: u32,
}

pub struct Scheduler<S, T> {
    runner: Arc<ImportRunner<S, T>>,
    job: ScheduledImport,
    config: SchedulerConfig,
    running: Arc<RwLock<bool>>,
    /// Held for the duration of a pass; ticks that cannot take it are skipped.
    pass_lock: Arc<Mutex<()>>,
    cancel: CancellationToken,
}

impl<S, T> Scheduler<S, T>
where
    S: CatalogSource + 'static,
    T: TitleSink + 'static,
{
    pub fn new(
        runner: Arc<ImportRunner<S, T>>,
        job: ScheduledImport,
        config: SchedulerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            runner,
            job,
            config,
            running: Arc::new(RwLock::new(false)),
            pass_lock: Arc::new(Mutex::new(())),
            cancel,
        }
    }

    /// Runs the cron loop until [`Scheduler::stop`] is called or the token is
    /// cancelled.
    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting background scheduler");

        let mut sched = JobScheduler::new().await?;

        let runner = Arc::clone(&self.runner);
        let running = Arc::clone(&self.running);
        let pass_lock = Arc::clone(&self.pass_lock);
        let scheduled = self.job.clone();
        let cancel = self.cancel.clone();

        let job = Job::new_async(self.config.cron_expression.as_str(), move |_uuid, _lock| {
            let runner = Arc::clone(&runner);
            let running = Arc::clone(&running);
            let pass_lock = Arc::clone(&pass_lock);
            let scheduled = scheduled.clone();
            let cancel = cancel.clone();
            Box::pin(async move {
                if !*running.read().await || cancel.is_cancelled() {
                    return;
                }

                let Ok(_guard) = pass_lock.try_lock() else {
                    warn!(
                        event = "job_skipped",
                        job_name = "scheduled_import",
                        "Previous import still running, skipping tick"
                    );
                    return;
                };

                run_pass(&runner, &scheduled, &cancel).await;
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Scheduler running with cron: {}", self.config.cron_expression);

        self.cancel.cancelled().await;

        *self.running.write().await = false;
        sched.shutdown().await?;
        info!("Scheduler stopped");
        Ok(())
    }

    /// Cancels the current pass and ends [`Scheduler::start`].
    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
        self.cancel.cancel();
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Runs one scheduled pass now, waiting for a pass already in progress.
    pub async fn run_once(&self) -> Vec<RunSummary> {
        info!("Running scheduled import now...");
        let _guard = self.pass_lock.lock().await;
        run_pass(&self.runner, &self.job, &self.cancel).await
    }
}

/// Imports every configured kind in turn. A failed kind is logged and the
/// pass moves on to the next one.
async fn run_pass<S: CatalogSource, T: TitleSink>(
    runner: &ImportRunner<S, T>,
    job: &ScheduledImport,
    cancel: &CancellationToken,
) -> Vec<RunSummary> {
    let start = std::time::Instant::now();
    info!(
        event = "job_started",
        job_name = "scheduled_import",
        "Starting scheduled import"
    );

    let mut summaries = Vec::with_capacity(job.kinds.len());
    for &kind in &job.kinds {
        if cancel.is_cancelled() {
            break;
        }

        let plan = RunPlan {
            kind,
            mode: RunMode::Scheduled { pages: job.pages },
            strategy: SortStrategy::RecentlyUpdated,
            per_page: job.per_page,
        };

        match runner.run(&plan, cancel).await {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                error!(
                    event = "job_failed",
                    job_name = "scheduled_import",
                    kind = %kind,
                    error = %e,
                    "Scheduled import failed"
                );
            }
        }
    }

    info!(
        event = "job_finished",
        job_name = "scheduled_import",
        duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        "Scheduled import finished"
    );

    summaries
}
