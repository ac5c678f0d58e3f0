//! Batch persistence of mapped catalog records.
//!
//! [`TitleSink`] is the seam the orchestrator writes through; [`UpsertEngine`]
//! is the `SeaORM` implementation. Each batch is written inside a single
//! transaction, so a failed batch leaves no partial rows behind.

use crate::db::{JunctionLink, LookupCategory, LookupRepository, Store, TitleRepository};
use crate::domain::{ContentKind, ExternalId};
use crate::models::title::{AnimeDetailRow, DetailRow, MangaDetailRow, TitleRecord};
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DbErr, TransactionTrait};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Title {kind} {external_id} has no row id after upsert")]
    UnresolvedTitle {
        kind: ContentKind,
        external_id: ExternalId,
    },

    #[error("Lookup '{name}' missing from {category} after insert")]
    UnresolvedLookup {
        category: LookupCategory,
        name: String,
    },
}

/// Destination for mapped records.
#[async_trait]
pub trait TitleSink: Send + Sync {
    /// Persists one batch and returns the number of records written.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError`] when the batch could not be written; no
    /// row of the batch is kept in that case.
    async fn persist_batch(&self, records: &[TitleRecord]) -> Result<usize, PersistenceError>;
}

pub struct UpsertEngine {
    store: Store,
}

impl UpsertEngine {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }
}

#[async_trait]
impl TitleSink for UpsertEngine {
    async fn persist_batch(&self, records: &[TitleRecord]) -> Result<usize, PersistenceError> {
        if records.is_empty() {
            return Ok(0);
        }

        let records = dedupe(records);
        let txn = self.store.conn.begin().await?;
        write_batch(&txn, &records).await?;
        txn.commit().await?;

        debug!(records = records.len(), "Persisted batch");
        Ok(records.len())
    }
}

/// Keeps the last occurrence of every `(external_id, kind)` so a single
/// statement never touches the same row twice.
fn dedupe(records: &[TitleRecord]) -> Vec<&TitleRecord> {
    let mut seen = HashSet::new();
    let mut kept: Vec<&TitleRecord> = records
        .iter()
        .rev()
        .filter(|r| seen.insert((r.external_id(), r.kind())))
        .collect();
    kept.reverse();
    kept
}

async fn write_batch<C: ConnectionTrait>(
    conn: &C,
    records: &[&TitleRecord],
) -> Result<(), PersistenceError> {
    let now = chrono::Utc::now().to_rfc3339();
    let titles = TitleRepository::new(conn);
    let lookups = LookupRepository::new(conn);

    let rows: Vec<_> = records.iter().map(|r| &r.title).collect();
    let title_ids = titles
        .upsert(&rows, &now)
        .await?
        .into_iter()
        .zip(records)
        .map(|(id, record)| {
            id.ok_or_else(|| PersistenceError::UnresolvedTitle {
                kind: record.kind(),
                external_id: record.external_id(),
            })
        })
        .collect::<Result<Vec<i32>, _>>()?;

    let mut anime: Vec<(i32, &AnimeDetailRow)> = Vec::new();
    let mut manga: Vec<(i32, &MangaDetailRow)> = Vec::new();
    for (record, &title_id) in records.iter().zip(&title_ids) {
        match &record.detail {
            DetailRow::Anime(detail) => anime.push((title_id, detail)),
            DetailRow::Manga(detail) => manga.push((title_id, detail)),
        }
    }
    titles.upsert_anime_details(&anime).await?;
    titles.upsert_manga_details(&manga).await?;

    for category in LookupCategory::ALL {
        let per_title: Vec<Vec<(&str, Option<&str>)>> = records
            .iter()
            .map(|r| lookup_names(r, category))
            .collect();

        let mut names: Vec<String> = per_title
            .iter()
            .flatten()
            .map(|(name, _)| (*name).to_string())
            .collect();
        names.sort();
        names.dedup();

        let ids = lookups
            .resolve(category, &names)
            .await
            .map_err(|e| unresolved_lookup(e, category))?;

        let links = build_links(category, &title_ids, &per_title, &ids)?;
        lookups.replace_links(category, &title_ids, &links).await?;
    }

    Ok(())
}

fn lookup_names(record: &TitleRecord, category: LookupCategory) -> Vec<(&str, Option<&str>)> {
    match category {
        LookupCategory::Genre => record.genres.iter().map(|g| (g.as_str(), None)).collect(),
        LookupCategory::Studio => record.studios.iter().map(|s| (s.as_str(), None)).collect(),
        LookupCategory::Author => record
            .authors
            .iter()
            .map(|a| (a.name.as_str(), a.role.as_deref()))
            .collect(),
    }
}

fn build_links(
    category: LookupCategory,
    title_ids: &[i32],
    per_title: &[Vec<(&str, Option<&str>)>],
    ids: &HashMap<String, i32>,
) -> Result<Vec<JunctionLink>, PersistenceError> {
    let mut links = Vec::new();
    for (&title_id, names) in title_ids.iter().zip(per_title) {
        let mut linked = HashSet::new();
        for &(name, role) in names {
            let lookup_id =
                ids.get(name)
                    .copied()
                    .ok_or_else(|| PersistenceError::UnresolvedLookup {
                        category,
                        name: name.to_string(),
                    })?;
            if linked.insert(lookup_id) {
                links.push(JunctionLink {
                    title_id,
                    lookup_id,
                    role: role.map(str::to_string),
                });
            }
        }
    }
    Ok(links)
}

fn unresolved_lookup(err: DbErr, category: LookupCategory) -> PersistenceError {
    match err {
        DbErr::RecordNotFound(message) => PersistenceError::UnresolvedLookup {
            category,
            name: message,
        },
        other => PersistenceError::Database(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::title::TitleRow;

    fn record(id: i32, title: &str) -> TitleRecord {
        TitleRecord {
            title: TitleRow {
                external_id: ExternalId::new(id),
                kind: ContentKind::Anime,
                title: title.to_string(),
                title_romaji: None,
                title_english: None,
                title_native: None,
                synonyms: Vec::new(),
                description: None,
                status: None,
                score: None,
                popularity: None,
                favourites: None,
                cover_image: None,
                banner_image: None,
                mal_id: None,
                country_of_origin: None,
                site_url: None,
                source_updated_at: None,
            },
            detail: DetailRow::Anime(AnimeDetailRow {
                format: None,
                episodes: None,
                duration_minutes: None,
                season: None,
                season_year: None,
                start_date: None,
                end_date: None,
            }),
            genres: vec!["Action".to_string(), "Drama".to_string()],
            studios: Vec::new(),
            authors: Vec::new(),
        }
    }

    #[test]
    fn dedupe_keeps_last_occurrence() {
        let records = vec![record(1, "old"), record(2, "other"), record(1, "new")];
        let kept = dedupe(&records);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].title.title, "other");
        assert_eq!(kept[1].title.title, "new");
    }

    #[test]
    fn links_skip_duplicate_lookup_ids() {
        let ids = HashMap::from([("Action".to_string(), 7)]);
        let per_title = vec![vec![("Action", None), ("Action", None)]];
        let links = build_links(LookupCategory::Genre, &[3], &per_title, &ids).unwrap();
        assert_eq!(
            links,
            vec![JunctionLink {
                title_id: 3,
                lookup_id: 7,
                role: None
            }]
        );
    }

    #[test]
    fn missing_lookup_id_is_reported() {
        let per_title = vec![vec![("Mecha", None)]];
        let err = build_links(LookupCategory::Genre, &[3], &per_title, &HashMap::new()).unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::UnresolvedLookup { name, .. } if name == "Mecha"
        ));
    }
}
