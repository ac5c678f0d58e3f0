use crate::domain::{ContentKind, ExternalId};
use crate::entities::{sync_state, titles};
use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::lookups::{JunctionLink, LookupCategory, LookupRepository};
pub use repositories::sync_state::{SyncStateRepository, SyncTotals};
pub use repositories::titles::TitleRepository;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");

        if let Some(path_str) = db_url.strip_prefix("sqlite:")
            && !in_memory
        {
            let path_str = path_str.trim_start_matches("//");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await?;
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        // Every pooled connection to an in-memory SQLite database is a separate database.
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            (max_connections, min_connections)
        };

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub const fn title_repo(&self) -> TitleRepository<'_, DatabaseConnection> {
        TitleRepository::new(&self.conn)
    }

    #[must_use]
    pub const fn lookup_repo(&self) -> LookupRepository<'_, DatabaseConnection> {
        LookupRepository::new(&self.conn)
    }

    const fn sync_state_repo(&self) -> SyncStateRepository<'_, DatabaseConnection> {
        SyncStateRepository::new(&self.conn)
    }

    pub async fn count_titles(&self, kind: ContentKind) -> Result<u64> {
        Ok(self.title_repo().count(kind).await?)
    }

    pub async fn get_title_by_external_id(
        &self,
        external_id: ExternalId,
        kind: ContentKind,
    ) -> Result<Option<titles::Model>> {
        Ok(self.title_repo().get_by_external_id(external_id, kind).await?)
    }

    pub async fn genre_names_for_title(&self, title_id: i32) -> Result<Vec<String>> {
        Ok(self
            .lookup_repo()
            .names_for_title(LookupCategory::Genre, title_id)
            .await?)
    }

    pub async fn studio_names_for_title(&self, title_id: i32) -> Result<Vec<String>> {
        Ok(self
            .lookup_repo()
            .names_for_title(LookupCategory::Studio, title_id)
            .await?)
    }

    pub async fn author_names_for_title(&self, title_id: i32) -> Result<Vec<String>> {
        Ok(self
            .lookup_repo()
            .names_for_title(LookupCategory::Author, title_id)
            .await?)
    }

    pub async fn count_lookups(&self, category: LookupCategory) -> Result<u64> {
        Ok(self.lookup_repo().count(category).await?)
    }

    pub async fn get_sync_state(&self, kind: ContentKind) -> Result<Option<sync_state::Model>> {
        Ok(self.sync_state_repo().get(kind).await?)
    }

    pub async fn last_synced_at(
        &self,
        kind: ContentKind,
    ) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        Ok(self.sync_state_repo().last_synced_at(kind).await?)
    }

    pub async fn record_sync(
        &self,
        kind: ContentKind,
        at: chrono::DateTime<chrono::Utc>,
        totals: SyncTotals,
    ) -> Result<()> {
        Ok(self.sync_state_repo().record(kind, at, totals).await?)
    }
}
