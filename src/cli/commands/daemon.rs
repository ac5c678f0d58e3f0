//! Scheduled import daemon

use super::{build_runner, print_summary};
use crate::config::Config;
use crate::domain::KindSelection;
use crate::scheduler::{ScheduledImport, Scheduler};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn cmd_daemon(
    config: &Config,
    cron: Option<String>,
    kind: Option<KindSelection>,
    now: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    info!(
        "anisync v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    let runner = Arc::new(build_runner(config).await?);

    let mut scheduler_config = config.scheduler.clone();
    if let Some(cron) = cron {
        scheduler_config.cron_expression = cron;
        scheduler_config.enabled = true;
    }

    let job = ScheduledImport {
        kinds: kind.unwrap_or(config.import.kinds).kinds(),
        pages: config.scheduled_pages(),
        per_page: config.catalog.per_page,
    };

    let scheduler = Scheduler::new(runner, job, scheduler_config, cancel.clone());

    if now {
        for summary in scheduler.run_once().await {
            print_summary(&summary);
        }
    }

    info!("Daemon running. Press Ctrl+C to stop.");
    scheduler.start().await?;
    info!("Daemon stopped");

    Ok(())
}
