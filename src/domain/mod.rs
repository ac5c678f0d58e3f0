//! Domain primitives shared by the import pipeline.
//!
//! Content kinds, catalog identifiers and sort strategies are closed types so
//! run configuration never branches on loose strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two kinds of content the catalog serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Anime,
    Manga,
}

impl ContentKind {
    pub const ALL: [Self; 2] = [Self::Anime, Self::Manga];

    /// Value stored in the `kind` column and used in file names.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Anime => "anime",
            Self::Manga => "manga",
        }
    }

    /// AniList `MediaType` enum value.
    #[must_use]
    pub const fn media_type(&self) -> &'static str {
        match self {
            Self::Anime => "ANIME",
            Self::Manga => "MANGA",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anime" => Ok(Self::Anime),
            "manga" => Ok(Self::Manga),
            other => Err(format!("unknown content kind '{other}' (expected anime or manga)")),
        }
    }
}

/// Which kinds a command should cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindSelection {
    Anime,
    Manga,
    #[default]
    All,
}

impl KindSelection {
    #[must_use]
    pub fn kinds(&self) -> Vec<ContentKind> {
        match self {
            Self::Anime => vec![ContentKind::Anime],
            Self::Manga => vec![ContentKind::Manga],
            Self::All => ContentKind::ALL.to_vec(),
        }
    }
}

impl FromStr for KindSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "both" => Ok(Self::All),
            other => other.parse::<ContentKind>().map(|kind| match kind {
                ContentKind::Anime => Self::Anime,
                ContentKind::Manga => Self::Manga,
            }),
        }
    }
}

/// Identifier assigned by the remote catalog. Used as the upsert key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(i32);

impl ExternalId {
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ExternalId {
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}

/// Ordering requested from the catalog when paging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortStrategy {
    #[default]
    Popularity,
    Trending,
    Score,
    RecentlyUpdated,
    Id,
}

impl SortStrategy {
    /// AniList `MediaSort` enum value.
    #[must_use]
    pub const fn media_sort(&self) -> &'static str {
        match self {
            Self::Popularity => "POPULARITY_DESC",
            Self::Trending => "TRENDING_DESC",
            Self::Score => "SCORE_DESC",
            Self::RecentlyUpdated => "UPDATED_AT_DESC",
            Self::Id => "ID",
        }
    }
}

impl FromStr for SortStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "popularity" | "popular" => Ok(Self::Popularity),
            "trending" => Ok(Self::Trending),
            "score" => Ok(Self::Score),
            "recently-updated" | "updated" | "recent" => Ok(Self::RecentlyUpdated),
            "id" => Ok(Self::Id),
            other => Err(format!("unknown sort strategy '{other}'")),
        }
    }
}
