use crate::domain::ContentKind;
use crate::entities::{prelude::*, sync_state};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ConnectionTrait, DbErr, EntityTrait, Set};

/// Counters stored alongside the last sync time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncTotals {
    pub imported: u64,
    pub skipped: u64,
    pub errors: u64,
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub struct SyncStateRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> SyncStateRepository<'a, C> {
    #[must_use]
    pub const fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn get(&self, kind: ContentKind) -> Result<Option<sync_state::Model>, DbErr> {
        SyncState::find_by_id(kind.as_str().to_string())
            .one(self.conn)
            .await
    }

    pub async fn last_synced_at(&self, kind: ContentKind) -> Result<Option<DateTime<Utc>>, DbErr> {
        let Some(state) = self.get(kind).await? else {
            return Ok(None);
        };

        DateTime::parse_from_rfc3339(&state.last_synced_at)
            .map(|at| Some(at.with_timezone(&Utc)))
            .map_err(|e| {
                DbErr::Custom(format!(
                    "invalid last_synced_at '{}' for {kind}: {e}",
                    state.last_synced_at
                ))
            })
    }

    pub async fn record(
        &self,
        kind: ContentKind,
        at: DateTime<Utc>,
        totals: SyncTotals,
    ) -> Result<(), DbErr> {
        let model = sync_state::ActiveModel {
            kind: Set(kind.as_str().to_string()),
            last_synced_at: Set(at.to_rfc3339()),
            last_run_imported: Set(to_i64(totals.imported)),
            last_run_skipped: Set(to_i64(totals.skipped)),
            last_run_errors: Set(to_i64(totals.errors)),
        };

        SyncState::insert(model)
            .on_conflict(
                OnConflict::column(sync_state::Column::Kind)
                    .update_columns([
                        sync_state::Column::LastSyncedAt,
                        sync_state::Column::LastRunImported,
                        sync_state::Column::LastRunSkipped,
                        sync_state::Column::LastRunErrors,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.conn)
            .await?;

        Ok(())
    }
}
