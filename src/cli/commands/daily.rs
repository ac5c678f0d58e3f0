//! Incremental import command handler

use super::{build_runner, run_kinds};
use crate::config::Config;
use crate::domain::{KindSelection, SortStrategy};
use crate::services::orchestrator::RunMode;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

pub async fn cmd_daily(
    config: &Config,
    kind: Option<KindSelection>,
    pages: Option<u32>,
    since: Option<DateTime<Utc>>,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let runner = build_runner(config).await?;
    let kinds = kind.unwrap_or(config.import.kinds).kinds();

    let mode = RunMode::Incremental {
        pages: pages.unwrap_or(config.import.daily_pages),
        since,
    };

    run_kinds(
        &runner,
        &kinds,
        mode,
        SortStrategy::RecentlyUpdated,
        config.catalog.per_page,
        cancel,
    )
    .await
}
