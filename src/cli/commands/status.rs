//! Import status command handler

use super::open_store;
use crate::config::Config;
use crate::db::LookupCategory;
use crate::domain::ContentKind;
use crate::services::progress::ProgressTracker;

pub async fn cmd_status(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    store.ping().await?;

    println!("Import status");
    println!("{:-<60}", "");

    for kind in ContentKind::ALL {
        let titles = store.count_titles(kind).await?;
        let checkpoint = ProgressTracker::for_kind(&config.import.progress_dir, kind)
            .load()
            .await?;

        println!("{kind}: {titles} titles");

        if checkpoint.last_page > 0 {
            let total = checkpoint
                .total_pages
                .map_or_else(|| "?".to_string(), |t| t.to_string());
            println!(
                "  Crawl checkpoint: page {}/{} ({} imported, {} skipped, {} errors)",
                checkpoint.last_page,
                total,
                checkpoint.imported,
                checkpoint.skipped,
                checkpoint.errors
            );
        } else {
            println!("  Crawl checkpoint: none");
        }

        match store.get_sync_state(kind).await? {
            Some(state) => println!(
                "  Last sync: {} ({} imported, {} skipped, {} errors)",
                state.last_synced_at,
                state.last_run_imported,
                state.last_run_skipped,
                state.last_run_errors
            ),
            None => println!("  Last sync: never"),
        }
    }

    println!();
    for category in LookupCategory::ALL {
        println!("{category}: {}", store.count_lookups(category).await?);
    }

    Ok(())
}
