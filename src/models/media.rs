//! Raw catalog records as returned by the AniList `Page.media` query.
//!
//! Every attribute except `id` may be null or absent in the payload.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    pub id: i32,
    pub id_mal: Option<i32>,
    pub title: Option<MediaTitle>,
    #[serde(default)]
    pub synonyms: Option<Vec<String>>,
    pub description: Option<String>,
    pub format: Option<String>,
    pub status: Option<String>,
    pub episodes: Option<i32>,
    pub duration: Option<i32>,
    pub chapters: Option<i32>,
    pub volumes: Option<i32>,
    pub season: Option<String>,
    pub season_year: Option<i32>,
    pub start_date: Option<FuzzyDate>,
    pub end_date: Option<FuzzyDate>,
    pub average_score: Option<i32>,
    pub mean_score: Option<i32>,
    pub popularity: Option<i32>,
    pub favourites: Option<i32>,
    pub genres: Option<Vec<String>>,
    pub is_adult: Option<bool>,
    pub cover_image: Option<CoverImage>,
    pub banner_image: Option<String>,
    pub country_of_origin: Option<String>,
    pub site_url: Option<String>,
    pub updated_at: Option<i64>,
    pub studios: Option<StudioConnection>,
    pub staff: Option<StaffConnection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaTitle {
    pub romaji: Option<String>,
    pub english: Option<String>,
    pub native: Option<String>,
}

/// Year/month/day triple where any component may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzyDate {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverImage {
    pub extra_large: Option<String>,
    pub large: Option<String>,
    pub medium: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudioConnection {
    #[serde(default)]
    pub nodes: Vec<StudioNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioNode {
    pub name: Option<String>,
    #[serde(default)]
    pub is_animation_studio: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffConnection {
    #[serde(default)]
    pub edges: Vec<StaffEdge>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffEdge {
    pub role: Option<String>,
    pub node: Option<StaffNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffNode {
    pub name: Option<StaffName>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffName {
    pub full: Option<String>,
}

/// Pagination block of a `Page` query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total: Option<i32>,
    pub current_page: Option<i32>,
    pub last_page: Option<i32>,
    #[serde(default)]
    pub has_next_page: bool,
    pub per_page: Option<i32>,
}

/// One page of media plus its pagination metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPage {
    #[serde(default)]
    pub page_info: PageInfo,
    #[serde(default)]
    pub media: Vec<Media>,
}

impl MediaPage {
    /// Total page count reported by the catalog, when known.
    #[must_use]
    pub fn total_pages(&self) -> Option<u32> {
        self.page_info
            .last_page
            .and_then(|p| u32::try_from(p).ok())
    }
}
