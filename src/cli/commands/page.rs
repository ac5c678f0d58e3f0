//! Manual page window command handler

use super::{build_runner, run_kinds};
use crate::config::Config;
use crate::domain::{KindSelection, SortStrategy};
use crate::services::orchestrator::RunMode;
use tokio_util::sync::CancellationToken;

pub async fn cmd_page(
    config: &Config,
    page: u32,
    pages: u32,
    kind: Option<KindSelection>,
    strategy: Option<SortStrategy>,
    per_page: Option<u32>,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    if page == 0 {
        anyhow::bail!("--page starts at 1");
    }

    let runner = build_runner(config).await?;
    let kinds = kind.unwrap_or(config.import.kinds).kinds();

    run_kinds(
        &runner,
        &kinds,
        RunMode::Manual {
            start_page: page,
            pages,
        },
        strategy.unwrap_or_default(),
        per_page.unwrap_or(config.catalog.per_page),
        cancel,
    )
    .await
}
