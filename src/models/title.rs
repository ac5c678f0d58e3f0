use crate::domain::{ContentKind, ExternalId};
use chrono::NaiveDate;
use serde::Serialize;

/// Normalized row for the `titles` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitleRow {
    pub external_id: ExternalId,
    pub kind: ContentKind,
    pub title: String,
    pub title_romaji: Option<String>,
    pub title_english: Option<String>,
    pub title_native: Option<String>,
    pub synonyms: Vec<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub score: Option<f32>,
    pub popularity: Option<i32>,
    pub favourites: Option<i32>,
    pub cover_image: Option<String>,
    pub banner_image: Option<String>,
    pub mal_id: Option<i32>,
    pub country_of_origin: Option<String>,
    pub site_url: Option<String>,
    pub source_updated_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnimeDetailRow {
    pub format: Option<String>,
    pub episodes: Option<i32>,
    pub duration_minutes: Option<i32>,
    pub season: Option<String>,
    pub season_year: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MangaDetailRow {
    pub format: Option<String>,
    pub chapters: Option<i32>,
    pub volumes: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Kind-specific extension of a title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DetailRow {
    Anime(AnimeDetailRow),
    Manga(MangaDetailRow),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorCredit {
    pub name: String,
    pub role: Option<String>,
}

/// Everything persisted for one catalog record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitleRecord {
    pub title: TitleRow,
    pub detail: DetailRow,
    pub genres: Vec<String>,
    pub studios: Vec<String>,
    pub authors: Vec<AuthorCredit>,
}

impl TitleRecord {
    #[must_use]
    pub const fn external_id(&self) -> ExternalId {
        self.title.external_id
    }

    #[must_use]
    pub const fn kind(&self) -> ContentKind {
        self.title.kind
    }
}
