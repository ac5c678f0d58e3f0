//! Full catalog crawl command handler

use super::{build_runner, run_kinds};
use crate::config::Config;
use crate::domain::{KindSelection, SortStrategy};
use crate::services::orchestrator::RunMode;
use tokio_util::sync::CancellationToken;

pub async fn cmd_crawl(
    config: &Config,
    kind: Option<KindSelection>,
    per_page: Option<u32>,
    max_pages: Option<u32>,
    fresh: bool,
    strategy: Option<SortStrategy>,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let runner = build_runner(config).await?;
    let kinds = kind.unwrap_or(config.import.kinds).kinds();

    let mode = RunMode::FullCrawl {
        resume: !fresh,
        max_pages: max_pages.unwrap_or(config.import.max_pages),
    };

    run_kinds(
        &runner,
        &kinds,
        mode,
        strategy.unwrap_or_default(),
        per_page.unwrap_or(config.catalog.per_page),
        cancel,
    )
    .await
}
