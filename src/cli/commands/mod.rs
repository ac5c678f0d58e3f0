mod crawl;
mod daemon;
mod daily;
mod page;
mod reset;
mod status;

pub use crawl::cmd_crawl;
pub use daemon::cmd_daemon;
pub use daily::cmd_daily;
pub use page::cmd_page;
pub use reset::cmd_reset;
pub use status::cmd_status;

use crate::clients::AnilistClient;
use crate::config::Config;
use crate::db::Store;
use crate::domain::{ContentKind, SortStrategy};
use crate::services::orchestrator::{
    ImportRunner, RunMode, RunPlan, RunSummary, RunnerOptions, StopReason,
};
use crate::services::upsert::UpsertEngine;
use tokio_util::sync::CancellationToken;

pub type CatalogRunner = ImportRunner<AnilistClient, UpsertEngine>;

pub(crate) async fn open_store(config: &Config) -> anyhow::Result<Store> {
    Store::with_pool_options(
        &config.general.database_url,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await
}

pub(crate) async fn build_runner(config: &Config) -> anyhow::Result<CatalogRunner> {
    let store = open_store(config).await?;
    let client = AnilistClient::new(&config.catalog)?;
    let engine = UpsertEngine::new(store.clone());

    Ok(ImportRunner::new(client, engine, RunnerOptions::from_config(config)).with_store(store))
}

/// Runs `mode` for each kind in turn, stopping early on interrupt.
pub(crate) async fn run_kinds(
    runner: &CatalogRunner,
    kinds: &[ContentKind],
    mode: RunMode,
    strategy: SortStrategy,
    per_page: u32,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    for &kind in kinds {
        let plan = RunPlan {
            kind,
            mode,
            strategy,
            per_page,
        };

        println!("Importing {kind} ({mode})...");
        let summary = runner.run(&plan, cancel).await?;
        print_summary(&summary);

        if summary.interrupted() {
            break;
        }
    }
    Ok(())
}

pub(crate) fn print_summary(summary: &RunSummary) {
    println!();
    println!("{} import summary ({})", summary.kind, summary.mode);
    println!("{:-<50}", "");

    if summary.stop_reason == StopReason::Interrupted {
        println!("Interrupted, progress saved.");
    } else {
        println!("Stopped: {}", summary.stop_reason);
    }

    let pages = summary
        .total_pages
        .map_or_else(|| "?".to_string(), |t| t.to_string());
    println!(
        "Pages:    {} processed (last {} of {})",
        summary.pages_processed, summary.last_page, pages
    );
    println!("Imported: {}", summary.counters.imported);
    println!("Skipped:  {}", summary.counters.skipped);
    println!("Errored:  {}", summary.counters.errors);
    println!("Elapsed:  {:.1}s", summary.elapsed.as_secs_f64());

    if !summary.errors.is_empty() {
        println!();
        println!("Errors:");
        for message in &summary.errors {
            println!("  - {message}");
        }
        if summary.suppressed_errors > 0 {
            println!("  ... and {} more", summary.suppressed_errors);
        }
    }
}
