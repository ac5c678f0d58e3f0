use super::WRITE_CHUNK;
use crate::domain::{ContentKind, ExternalId};
use crate::entities::{anime_details, manga_details, prelude::*, titles};
use crate::models::title::{AnimeDetailRow, MangaDetailRow, TitleRow};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect,
    Set,
};
use std::collections::HashMap;

pub struct TitleRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> TitleRepository<'a, C> {
    #[must_use]
    pub const fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    fn to_active_model(row: &TitleRow, now: &str) -> titles::ActiveModel {
        titles::ActiveModel {
            external_id: Set(row.external_id.value()),
            kind: Set(row.kind.as_str().to_string()),
            title: Set(row.title.clone()),
            title_romaji: Set(row.title_romaji.clone()),
            title_english: Set(row.title_english.clone()),
            title_native: Set(row.title_native.clone()),
            synonyms: Set((!row.synonyms.is_empty())
                .then(|| serde_json::to_string(&row.synonyms).ok())
                .flatten()),
            description: Set(row.description.clone()),
            status: Set(row.status.clone()),
            score: Set(row.score),
            popularity: Set(row.popularity),
            favourites: Set(row.favourites),
            cover_image: Set(row.cover_image.clone()),
            banner_image: Set(row.banner_image.clone()),
            mal_id: Set(row.mal_id),
            country_of_origin: Set(row.country_of_origin.clone()),
            site_url: Set(row.site_url.clone()),
            source_updated_at: Set(row.source_updated_at),
            created_at: Set(now.to_string()),
            updated_at: Set(now.to_string()),
            ..Default::default()
        }
    }

    /// Inserts or updates titles keyed by `(external_id, kind)`.
    ///
    /// Returns the internal ids in the same order as `rows`; `None` marks a
    /// row that could not be read back.
    pub async fn upsert(&self, rows: &[&TitleRow], now: &str) -> Result<Vec<Option<i32>>, DbErr> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        for chunk in rows.chunks(WRITE_CHUNK) {
            let models = chunk.iter().map(|row| Self::to_active_model(row, now));

            Titles::insert_many(models)
                .on_conflict(
                    OnConflict::columns([titles::Column::ExternalId, titles::Column::Kind])
                        .update_columns([
                            titles::Column::Title,
                            titles::Column::TitleRomaji,
                            titles::Column::TitleEnglish,
                            titles::Column::TitleNative,
                            titles::Column::Synonyms,
                            titles::Column::Description,
                            titles::Column::Status,
                            titles::Column::Score,
                            titles::Column::Popularity,
                            titles::Column::Favourites,
                            titles::Column::CoverImage,
                            titles::Column::BannerImage,
                            titles::Column::MalId,
                            titles::Column::CountryOfOrigin,
                            titles::Column::SiteUrl,
                            titles::Column::SourceUpdatedAt,
                            titles::Column::UpdatedAt,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(self.conn)
                .await?;
        }

        let ids = self.resolve_ids(rows).await?;

        Ok(rows
            .iter()
            .map(|row| ids.get(&(row.external_id.value(), row.kind)).copied())
            .collect())
    }

    async fn resolve_ids(
        &self,
        rows: &[&TitleRow],
    ) -> Result<HashMap<(i32, ContentKind), i32>, DbErr> {
        let mut by_kind: HashMap<ContentKind, Vec<i32>> = HashMap::new();
        for row in rows {
            by_kind
                .entry(row.kind)
                .or_default()
                .push(row.external_id.value());
        }

        let mut ids = HashMap::new();
        for (kind, external_ids) in by_kind {
            for chunk in external_ids.chunks(WRITE_CHUNK * 10) {
                let found: Vec<(i32, i32)> = Titles::find()
                    .select_only()
                    .column(titles::Column::Id)
                    .column(titles::Column::ExternalId)
                    .filter(titles::Column::Kind.eq(kind.as_str()))
                    .filter(titles::Column::ExternalId.is_in(chunk.iter().copied()))
                    .into_tuple()
                    .all(self.conn)
                    .await?;

                ids.extend(
                    found
                        .into_iter()
                        .map(|(id, external_id)| ((external_id, kind), id)),
                );
            }
        }

        Ok(ids)
    }

    pub async fn upsert_anime_details(&self, rows: &[(i32, &AnimeDetailRow)]) -> Result<(), DbErr> {
        for chunk in rows.chunks(WRITE_CHUNK) {
            let models = chunk
                .iter()
                .map(|(title_id, detail)| anime_details::ActiveModel {
                    title_id: Set(*title_id),
                    format: Set(detail.format.clone()),
                    episodes: Set(detail.episodes),
                    duration_minutes: Set(detail.duration_minutes),
                    season: Set(detail.season.clone()),
                    season_year: Set(detail.season_year),
                    start_date: Set(detail.start_date),
                    end_date: Set(detail.end_date),
                });

            AnimeDetails::insert_many(models)
                .on_conflict(
                    OnConflict::column(anime_details::Column::TitleId)
                        .update_columns([
                            anime_details::Column::Format,
                            anime_details::Column::Episodes,
                            anime_details::Column::DurationMinutes,
                            anime_details::Column::Season,
                            anime_details::Column::SeasonYear,
                            anime_details::Column::StartDate,
                            anime_details::Column::EndDate,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(self.conn)
                .await?;
        }
        Ok(())
    }

    pub async fn upsert_manga_details(&self, rows: &[(i32, &MangaDetailRow)]) -> Result<(), DbErr> {
        for chunk in rows.chunks(WRITE_CHUNK) {
            let models = chunk
                .iter()
                .map(|(title_id, detail)| manga_details::ActiveModel {
                    title_id: Set(*title_id),
                    format: Set(detail.format.clone()),
                    chapters: Set(detail.chapters),
                    volumes: Set(detail.volumes),
                    start_date: Set(detail.start_date),
                    end_date: Set(detail.end_date),
                });

            MangaDetails::insert_many(models)
                .on_conflict(
                    OnConflict::column(manga_details::Column::TitleId)
                        .update_columns([
                            manga_details::Column::Format,
                            manga_details::Column::Chapters,
                            manga_details::Column::Volumes,
                            manga_details::Column::StartDate,
                            manga_details::Column::EndDate,
                        ])
                        .to_owned(),
                )
                .exec_without_returning(self.conn)
                .await?;
        }
        Ok(())
    }

    pub async fn get_by_external_id(
        &self,
        external_id: ExternalId,
        kind: ContentKind,
    ) -> Result<Option<titles::Model>, DbErr> {
        Titles::find()
            .filter(titles::Column::ExternalId.eq(external_id.value()))
            .filter(titles::Column::Kind.eq(kind.as_str()))
            .one(self.conn)
            .await
    }

    pub async fn get_anime_details(
        &self,
        title_id: i32,
    ) -> Result<Option<anime_details::Model>, DbErr> {
        AnimeDetails::find_by_id(title_id).one(self.conn).await
    }

    pub async fn get_manga_details(
        &self,
        title_id: i32,
    ) -> Result<Option<manga_details::Model>, DbErr> {
        MangaDetails::find_by_id(title_id).one(self.conn).await
    }

    pub async fn count(&self, kind: ContentKind) -> Result<u64, DbErr> {
        Titles::find()
            .filter(titles::Column::Kind.eq(kind.as_str()))
            .count(self.conn)
            .await
    }
}
