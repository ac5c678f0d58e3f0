//! Normalization of raw catalog records into persisted row-sets.
//!
//! [`map_media`] is pure: it either produces a [`TitleRecord`] or a
//! [`SkipReason`] explaining why the record is not imported. Only the id and
//! one non-blank title are mandatory; every other attribute may be null.

use crate::domain::{ContentKind, ExternalId};
use crate::models::media::{FuzzyDate, Media};
use crate::models::title::{
    AnimeDetailRow, AuthorCredit, DetailRow, MangaDetailRow, TitleRecord, TitleRow,
};
use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid line break regex"));
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank line regex"));

/// Staff roles credited as authors of a manga.
const AUTHOR_ROLE_KEYWORDS: [&str; 3] = ["story", "art", "original creator"];

/// Filtering rules applied while mapping.
#[derive(Debug, Clone, Default)]
pub struct MapperRules {
    blocked_genres: HashSet<String>,
}

impl MapperRules {
    #[must_use]
    pub fn new<I, S>(blocked_genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            blocked_genres: blocked_genres
                .into_iter()
                .map(|g| g.as_ref().trim().to_lowercase())
                .filter(|g| !g.is_empty())
                .collect(),
        }
    }

    fn blocked_genre<'a>(&self, genres: &'a [String]) -> Option<&'a String> {
        genres
            .iter()
            .find(|g| self.blocked_genres.contains(&g.trim().to_lowercase()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingTitle,
    Adult,
    BlockedGenre(String),
    /// Not modified since the last sync; set by incremental runs.
    Unchanged,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTitle => f.write_str("no usable title"),
            Self::Adult => f.write_str("adult content"),
            Self::BlockedGenre(genre) => write!(f, "blocked genre {genre}"),
            Self::Unchanged => f.write_str("unchanged since last sync"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapOutcome {
    Mapped(Box<TitleRecord>),
    Skipped(SkipReason),
}

pub fn map_media(media: &Media, kind: ContentKind, rules: &MapperRules) -> MapOutcome {
    let title = media.title.clone().unwrap_or_default();
    let romaji = non_blank(title.romaji.as_deref());
    let english = non_blank(title.english.as_deref());
    let native = non_blank(title.native.as_deref());

    let Some(display) = english.clone().or_else(|| romaji.clone()).or_else(|| native.clone())
    else {
        return MapOutcome::Skipped(SkipReason::MissingTitle);
    };

    if media.is_adult == Some(true) {
        return MapOutcome::Skipped(SkipReason::Adult);
    }

    let genres = dedupe_names(media.genres.iter().flatten().map(String::as_str));
    if let Some(genre) = rules.blocked_genre(&genres) {
        return MapOutcome::Skipped(SkipReason::BlockedGenre(genre.clone()));
    }

    let synonyms = dedupe_names(media.synonyms.iter().flatten().map(String::as_str));

    let row = TitleRow {
        external_id: ExternalId::new(media.id),
        kind,
        title: display,
        title_romaji: romaji,
        title_english: english,
        title_native: native,
        synonyms,
        description: media.description.as_deref().and_then(clean_description),
        status: non_blank(media.status.as_deref()),
        score: normalize_score(media.average_score.or(media.mean_score)),
        popularity: media.popularity,
        favourites: media.favourites,
        cover_image: media.cover_image.as_ref().and_then(|c| {
            c.extra_large
                .clone()
                .or_else(|| c.large.clone())
                .or_else(|| c.medium.clone())
        }),
        banner_image: non_blank(media.banner_image.as_deref()),
        mal_id: media.id_mal,
        country_of_origin: non_blank(media.country_of_origin.as_deref()),
        site_url: non_blank(media.site_url.as_deref()),
        source_updated_at: media.updated_at,
    };

    let start_date = media.start_date.and_then(normalize_date);
    let end_date = media.end_date.and_then(normalize_date);

    let (detail, studios, authors) = match kind {
        ContentKind::Anime => (
            DetailRow::Anime(AnimeDetailRow {
                format: non_blank(media.format.as_deref()),
                episodes: media.episodes,
                duration_minutes: media.duration,
                season: non_blank(media.season.as_deref()),
                season_year: media.season_year,
                start_date,
                end_date,
            }),
            studio_names(media),
            Vec::new(),
        ),
        ContentKind::Manga => (
            DetailRow::Manga(MangaDetailRow {
                format: non_blank(media.format.as_deref()),
                chapters: media.chapters,
                volumes: media.volumes,
                start_date,
                end_date,
            }),
            Vec::new(),
            author_credits(media),
        ),
    };

    MapOutcome::Mapped(Box::new(TitleRecord {
        title: row,
        detail,
        genres,
        studios,
        authors,
    }))
}

/// Turns a fuzzy catalog date into a calendar date.
///
/// Missing month or day default to 1. A missing year, or a combination that
/// is not a real date, yields `None`.
#[must_use]
pub fn normalize_date(date: FuzzyDate) -> Option<NaiveDate> {
    let year = date.year?;
    NaiveDate::from_ymd_opt(year, date.month.unwrap_or(1), date.day.unwrap_or(1))
}

/// Converts the catalog's 0–100 score to a 0–10 scale.
#[must_use]
pub fn normalize_score(score: Option<i32>) -> Option<f32> {
    let score = score?.clamp(0, 100);
    #[allow(clippy::cast_precision_loss)]
    Some(score as f32 / 10.0)
}

fn clean_description(raw: &str) -> Option<String> {
    let with_breaks = LINE_BREAK.replace_all(raw, "\n");
    let stripped = HTML_TAG.replace_all(&with_breaks, "");
    let decoded = html_escape::decode_html_entities(&stripped);
    let collapsed = BLANK_LINES.replace_all(decoded.trim(), "\n\n");
    non_blank(Some(collapsed.as_ref()))
}

fn studio_names(media: &Media) -> Vec<String> {
    let nodes = media.studios.iter().flat_map(|s| s.nodes.iter());
    dedupe_names(nodes.filter_map(|n| n.name.as_deref()))
}

fn author_credits(media: &Media) -> Vec<AuthorCredit> {
    let mut seen = HashSet::new();
    let mut credits = Vec::new();

    for edge in media.staff.iter().flat_map(|s| s.edges.iter()) {
        let role = non_blank(edge.role.as_deref());
        let is_author = role.as_deref().is_some_and(|r| {
            let r = r.to_lowercase();
            AUTHOR_ROLE_KEYWORDS.iter().any(|k| r.contains(k))
        });
        if !is_author {
            continue;
        }

        let name = edge
            .node
            .as_ref()
            .and_then(|n| n.name.as_ref())
            .and_then(|n| non_blank(n.full.as_deref()));

        if let Some(name) = name
            && seen.insert(name.to_lowercase())
        {
            credits.push(AuthorCredit { name, role });
        }
    }

    credits
}

fn dedupe_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .filter_map(|n| non_blank(Some(n)))
        .filter(|n| seen.insert(n.to_lowercase()))
        .collect()
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::media::{
        MediaTitle, StaffConnection, StaffEdge, StaffName, StaffNode, StudioConnection, StudioNode,
    };

    fn rules() -> MapperRules {
        MapperRules::new(["Hentai"])
    }

    fn anime(id: i32) -> Media {
        Media {
            id,
            title: Some(MediaTitle {
                romaji: Some("Sousou no Frieren".to_string()),
                english: Some("Frieren: Beyond Journey's End".to_string()),
                native: Some("葬送のフリーレン".to_string()),
            }),
            format: Some("TV".to_string()),
            episodes: Some(28),
            average_score: Some(91),
            genres: Some(vec!["Adventure".to_string(), "Drama".to_string()]),
            start_date: Some(FuzzyDate {
                year: Some(2023),
                month: Some(9),
                day: Some(29),
            }),
            studios: Some(StudioConnection {
                nodes: vec![StudioNode {
                    name: Some("Madhouse".to_string()),
                    is_animation_studio: true,
                }],
            }),
            is_adult: Some(false),
            ..Default::default()
        }
    }

    fn mapped(outcome: MapOutcome) -> TitleRecord {
        match outcome {
            MapOutcome::Mapped(record) => *record,
            MapOutcome::Skipped(reason) => panic!("unexpected skip: {reason}"),
        }
    }

    #[test]
    fn maps_full_anime_record() {
        let record = mapped(map_media(&anime(154_587), ContentKind::Anime, &rules()));

        assert_eq!(record.title.external_id, ExternalId::new(154_587));
        assert_eq!(record.title.title, "Frieren: Beyond Journey's End");
        assert_eq!(record.title.score, Some(9.1));
        assert_eq!(record.genres, vec!["Adventure", "Drama"]);
        assert_eq!(record.studios, vec!["Madhouse"]);
        assert!(record.authors.is_empty());

        let DetailRow::Anime(detail) = record.detail else {
            panic!("expected anime detail");
        };
        assert_eq!(detail.episodes, Some(28));
        assert_eq!(detail.start_date, NaiveDate::from_ymd_opt(2023, 9, 29));
        assert_eq!(detail.end_date, None);
    }

    #[test]
    fn display_title_falls_back_to_romaji_then_native() {
        let mut media = anime(1);
        media.title = Some(MediaTitle {
            romaji: None,
            english: Some("   ".to_string()),
            native: Some("ネイティブ".to_string()),
        });
        let record = mapped(map_media(&media, ContentKind::Anime, &rules()));
        assert_eq!(record.title.title, "ネイティブ");
        assert_eq!(record.title.title_english, None);
    }

    #[test]
    fn skips_record_without_any_title() {
        let mut media = anime(2);
        media.title = Some(MediaTitle {
            romaji: None,
            english: Some(String::new()),
            native: None,
        });
        assert_eq!(
            map_media(&media, ContentKind::Anime, &rules()),
            MapOutcome::Skipped(SkipReason::MissingTitle)
        );

        media.title = None;
        assert_eq!(
            map_media(&media, ContentKind::Anime, &rules()),
            MapOutcome::Skipped(SkipReason::MissingTitle)
        );
    }

    #[test]
    fn skips_adult_and_blocked_genres() {
        let mut adult = anime(3);
        adult.is_adult = Some(true);
        assert_eq!(
            map_media(&adult, ContentKind::Anime, &rules()),
            MapOutcome::Skipped(SkipReason::Adult)
        );

        let mut blocked = anime(4);
        blocked.genres = Some(vec!["Romance".to_string(), "hentai".to_string()]);
        assert_eq!(
            map_media(&blocked, ContentKind::Anime, &rules()),
            MapOutcome::Skipped(SkipReason::BlockedGenre("hentai".to_string()))
        );
    }

    #[test]
    fn tolerates_only_id_and_title() {
        let media = Media {
            id: 9,
            title: Some(MediaTitle {
                romaji: Some("Only Title".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let record = mapped(map_media(&media, ContentKind::Manga, &rules()));
        assert_eq!(record.title.score, None);
        assert_eq!(record.title.description, None);
        assert!(record.genres.is_empty());
        assert!(matches!(record.detail, DetailRow::Manga(_)));
    }

    #[test]
    fn date_defaults_missing_month_and_day() {
        let date = FuzzyDate {
            year: Some(2020),
            month: None,
            day: None,
        };
        assert_eq!(normalize_date(date), NaiveDate::from_ymd_opt(2020, 1, 1));

        let partial = FuzzyDate {
            year: Some(2019),
            month: Some(7),
            day: None,
        };
        assert_eq!(normalize_date(partial), NaiveDate::from_ymd_opt(2019, 7, 1));
    }

    #[test]
    fn date_without_year_is_absent() {
        let date = FuzzyDate {
            year: None,
            month: Some(4),
            day: Some(12),
        };
        assert_eq!(normalize_date(date), None);

        let impossible = FuzzyDate {
            year: Some(2021),
            month: Some(2),
            day: Some(30),
        };
        assert_eq!(normalize_date(impossible), None);
    }

    #[test]
    fn score_scales_to_ten() {
        assert_eq!(normalize_score(Some(85)), Some(8.5));
        assert_eq!(normalize_score(Some(100)), Some(10.0));
        assert_eq!(normalize_score(Some(0)), Some(0.0));
        assert_eq!(normalize_score(None), None);
    }

    #[test]
    fn score_falls_back_to_mean_score() {
        let mut media = anime(5);
        media.average_score = None;
        media.mean_score = Some(70);
        let record = mapped(map_media(&media, ContentKind::Anime, &rules()));
        assert_eq!(record.title.score, Some(7.0));
    }

    #[test]
    fn description_is_cleaned() {
        let mut media = anime(6);
        media.description =
            Some("First line<br><br>Second &amp; <i>third</i><br/>".to_string());
        let record = mapped(map_media(&media, ContentKind::Anime, &rules()));
        assert_eq!(
            record.title.description.as_deref(),
            Some("First line\n\nSecond & third")
        );
    }

    #[test]
    fn manga_authors_come_from_story_and_art_roles() {
        let edge = |name: &str, role: &str| StaffEdge {
            role: Some(role.to_string()),
            node: Some(StaffNode {
                name: Some(StaffName {
                    full: Some(name.to_string()),
                }),
            }),
        };

        let media = Media {
            id: 30_013,
            title: Some(MediaTitle {
                romaji: Some("One Piece".to_string()),
                ..Default::default()
            }),
            staff: Some(StaffConnection {
                edges: vec![
                    edge("Eiichiro Oda", "Story & Art"),
                    edge("Some Editor", "Editing"),
                    edge("eiichiro oda", "Original Creator"),
                ],
            }),
            ..Default::default()
        };

        let record = mapped(map_media(&media, ContentKind::Manga, &rules()));
        assert_eq!(
            record.authors,
            vec![AuthorCredit {
                name: "Eiichiro Oda".to_string(),
                role: Some("Story & Art".to_string()),
            }]
        );
        assert!(record.studios.is_empty());
    }

    #[test]
    fn genres_are_deduplicated() {
        let mut media = anime(7);
        media.genres = Some(vec![
            "Action".to_string(),
            " action ".to_string(),
            String::new(),
            "Comedy".to_string(),
        ]);
        let record = mapped(map_media(&media, ContentKind::Anime, &rules()));
        assert_eq!(record.genres, vec!["Action", "Comedy"]);
    }
}
