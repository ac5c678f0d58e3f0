pub mod anilist;
pub mod rate_limit;

use crate::domain::{ContentKind, SortStrategy};
use crate::models::media::MediaPage;
use async_trait::async_trait;

use std::time::Duration;

pub use anilist::{AnilistClient, CatalogError};

/// Result of one page request.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Page(MediaPage),
    /// The catalog throttled us; request the same page again once the
    /// cool-down has passed.
    RetryPage(Duration),
}

/// A paginated source of catalog records.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_page(
        &self,
        kind: ContentKind,
        page: u32,
        per_page: u32,
        sort: SortStrategy,
    ) -> Result<FetchOutcome, CatalogError>;
}
