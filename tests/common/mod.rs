#![allow(dead_code)]

use anisync::clients::{CatalogError, CatalogSource, FetchOutcome};
use anisync::db::Store;
use anisync::domain::{ContentKind, SortStrategy};
use anisync::models::media::{Media, MediaPage, MediaTitle, PageInfo};
use anisync::services::{MapperRules, RunnerOptions};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub async fn memory_store() -> Store {
    Store::new("sqlite::memory:")
        .await
        .expect("failed to open in-memory store")
}

pub fn media(id: i32, title: &str) -> Media {
    Media {
        id,
        title: Some(MediaTitle {
            romaji: Some(title.to_string()),
            english: None,
            native: None,
        }),
        genres: Some(vec!["Action".to_string()]),
        average_score: Some(80),
        ..Default::default()
    }
}

pub fn adult_media(id: i32, title: &str) -> Media {
    Media {
        is_adult: Some(true),
        ..media(id, title)
    }
}

pub fn page(current: u32, last: u32, media: Vec<Media>) -> MediaPage {
    MediaPage {
        page_info: PageInfo {
            total: None,
            current_page: i32::try_from(current).ok(),
            last_page: i32::try_from(last).ok(),
            has_next_page: current < last,
            per_page: Some(50),
        },
        media,
    }
}

pub fn options(progress_dir: &Path) -> RunnerOptions {
    RunnerOptions {
        batch_size: 10,
        log_every_pages: 10,
        page_delay: Duration::ZERO,
        progress_dir: progress_dir.to_path_buf(),
        rules: MapperRules::new(["Hentai"]),
    }
}

/// Serves canned pages and remembers every request.
#[derive(Default)]
pub struct ScriptedSource {
    responses: Mutex<HashMap<u32, VecDeque<FetchOutcome>>>,
    failures: Mutex<HashMap<u32, u16>>,
    requested: Mutex<Vec<u32>>,
    cancel_on: Mutex<Option<(u32, CancellationToken)>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, page: u32, outcome: FetchOutcome) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(page)
            .or_default()
            .push_back(outcome);
        self
    }

    pub fn with_failure(self, page: u32, status: u16) -> Self {
        self.failures.lock().unwrap().insert(page, status);
        self
    }

    /// Cancels `token` while serving `page`.
    pub fn cancel_on(self, page: u32, token: CancellationToken) -> Self {
        *self.cancel_on.lock().unwrap() = Some((page, token));
        self
    }

    pub fn requested(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogSource for ScriptedSource {
    async fn fetch_page(
        &self,
        _kind: ContentKind,
        page: u32,
        _per_page: u32,
        _sort: SortStrategy,
    ) -> Result<FetchOutcome, CatalogError> {
        self.requested.lock().unwrap().push(page);

        if let Some((cancel_page, token)) = self.cancel_on.lock().unwrap().as_ref()
            && *cancel_page == page
        {
            token.cancel();
        }

        if let Some(status) = self.failures.lock().unwrap().get(&page) {
            return Err(CatalogError::Api {
                status: *status,
                body: "scripted failure".to_string(),
            });
        }

        let outcome = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&page)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| FetchOutcome::Page(self::page(page, page, Vec::new())));
        Ok(outcome)
    }
}
