//! Crawl checkpoints.
//!
//! One JSON file per content kind records the last fully processed page and
//! the running totals, so an interrupted crawl can pick up where it stopped.

use crate::domain::ContentKind;
use crate::services::orchestrator::ImportCounters;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("Checkpoint I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint at {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Persisted crawl position. `last_page` 0 means nothing was processed yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub kind: Option<ContentKind>,
    pub last_page: u32,
    pub total_pages: Option<u32>,
    pub imported: u64,
    pub skipped: u64,
    pub errors: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    /// First page a resumed crawl should request.
    #[must_use]
    pub const fn next_page(&self) -> u32 {
        self.last_page.saturating_add(1)
    }

    #[must_use]
    pub const fn counters(&self) -> ImportCounters {
        ImportCounters {
            imported: self.imported,
            skipped: self.skipped,
            errors: self.errors,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressTracker {
    kind: ContentKind,
    path: PathBuf,
}

impl ProgressTracker {
    #[must_use]
    pub fn for_kind(dir: impl AsRef<Path>, kind: ContentKind) -> Self {
        Self {
            kind,
            path: dir
                .as_ref()
                .join(format!("import-progress-{}.json", kind.as_str())),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrites the checkpoint with `last_page` and the given totals.
    pub async fn save(
        &self,
        last_page: u32,
        total_pages: Option<u32>,
        counters: &ImportCounters,
    ) -> Result<Checkpoint, ProgressError> {
        let checkpoint = Checkpoint {
            kind: Some(self.kind),
            last_page,
            total_pages,
            imported: counters.imported,
            skipped: counters.skipped,
            errors: counters.errors,
            updated_at: Some(Utc::now()),
        };

        let json = serde_json::to_vec_pretty(&checkpoint).map_err(|source| ProgressError::Json {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error(source))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|source| self.io_error(source))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| self.io_error(source))?;

        debug!(kind = %self.kind, last_page, "Checkpoint saved");
        Ok(checkpoint)
    }

    /// Reads the checkpoint, or the zero checkpoint when none exists.
    pub async fn load(&self) -> Result<Checkpoint, ProgressError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| ProgressError::Json {
                path: self.path.clone(),
                source,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Checkpoint::default()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    /// Returns whether a checkpoint file was removed.
    pub async fn clear(&self) -> Result<bool, ProgressError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> ProgressError {
        ProgressError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters(imported: u64, skipped: u64, errors: u64) -> ImportCounters {
        ImportCounters {
            imported,
            skipped,
            errors,
        }
    }

    #[tokio::test]
    async fn missing_file_loads_zero_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ProgressTracker::for_kind(dir.path(), ContentKind::Anime);

        let checkpoint = tracker.load().await.unwrap();
        assert_eq!(checkpoint, Checkpoint::default());
        assert_eq!(checkpoint.next_page(), 1);
    }

    #[tokio::test]
    async fn save_then_load_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ProgressTracker::for_kind(dir.path(), ContentKind::Manga);

        tracker.save(4, Some(120), &counters(150, 3, 0)).await.unwrap();
        tracker.save(5, Some(120), &counters(190, 4, 1)).await.unwrap();

        let checkpoint = tracker.load().await.unwrap();
        assert_eq!(checkpoint.kind, Some(ContentKind::Manga));
        assert_eq!(checkpoint.last_page, 5);
        assert_eq!(checkpoint.next_page(), 6);
        assert_eq!(checkpoint.total_pages, Some(120));
        assert_eq!(checkpoint.counters(), counters(190, 4, 1));
        assert!(checkpoint.updated_at.is_some());
        assert!(!dir.path().join("import-progress-manga.json.tmp").exists());
    }

    #[tokio::test]
    async fn file_uses_camel_case_fields() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ProgressTracker::for_kind(dir.path(), ContentKind::Anime);
        tracker.save(2, None, &counters(1, 2, 3)).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("import-progress-anime.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["kind"], "anime");
        assert_eq!(json["lastPage"], 2);
        assert_eq!(json["totalPages"], serde_json::Value::Null);
        assert_eq!(json["imported"], 1);
        assert!(json["updatedAt"].is_string());
    }

    #[tokio::test]
    async fn kinds_do_not_share_files() {
        let dir = tempfile::tempdir().unwrap();
        let anime = ProgressTracker::for_kind(dir.path(), ContentKind::Anime);
        let manga = ProgressTracker::for_kind(dir.path(), ContentKind::Manga);

        anime.save(9, None, &ImportCounters::default()).await.unwrap();
        assert_eq!(manga.load().await.unwrap().last_page, 0);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ProgressTracker::for_kind(dir.path(), ContentKind::Anime);
        std::fs::write(tracker.path(), "{not json").unwrap();

        assert!(matches!(
            tracker.load().await,
            Err(ProgressError::Json { .. })
        ));
    }

    #[tokio::test]
    async fn clear_removes_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = ProgressTracker::for_kind(dir.path(), ContentKind::Anime);
        tracker.save(3, None, &ImportCounters::default()).await.unwrap();

        assert!(tracker.clear().await.unwrap());
        assert!(!tracker.clear().await.unwrap());
        assert_eq!(tracker.load().await.unwrap().last_page, 0);
    }
}
