//! Checkpoint reset command handler

use crate::config::Config;
use crate::domain::KindSelection;
use crate::services::progress::ProgressTracker;

pub async fn cmd_reset(config: &Config, kind: Option<KindSelection>) -> anyhow::Result<()> {
    for kind in kind.unwrap_or_default().kinds() {
        let tracker = ProgressTracker::for_kind(&config.import.progress_dir, kind);
        if tracker.clear().await? {
            println!("✓ Removed {kind} checkpoint ({})", tracker.path().display());
        } else {
            println!("No {kind} checkpoint to remove");
        }
    }
    Ok(())
}
