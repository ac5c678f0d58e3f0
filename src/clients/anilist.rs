use super::rate_limit::{RateLimitInfo, RateLimitPolicy};
use super::{CatalogSource, FetchOutcome};
use crate::config::CatalogConfig;
use crate::domain::{ContentKind, SortStrategy};
use crate::models::media::MediaPage;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const PAGE_QUERY: &str = r"
    query ($page: Int, $perPage: Int, $type: MediaType, $sort: [MediaSort]) {
        Page(page: $page, perPage: $perPage) {
            pageInfo { total currentPage lastPage hasNextPage perPage }
            media(type: $type, sort: $sort) {
                id
                idMal
                title { romaji english native }
                synonyms
                description(asHtml: false)
                format
                status
                episodes
                duration
                chapters
                volumes
                season
                seasonYear
                startDate { year month day }
                endDate { year month day }
                averageScore
                meanScore
                popularity
                favourites
                genres
                isAdult
                coverImage { extraLarge large medium }
                bannerImage
                countryOfOrigin
                siteUrl
                updatedAt
                studios(isMain: true) {
                    nodes { name isAnimationStudio }
                }
                staff(perPage: 10, sort: [RELEVANCE]) {
                    edges { role node { name { full } } }
                }
            }
        }
    }
";

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Catalog returned an error payload: {payload}")]
    Data { payload: serde_json::Value },

    #[error("Catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct GraphQLRequest<'a> {
    query: &'a str,
    variables: PageVariables<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageVariables<'a> {
    page: u32,
    per_page: u32,
    #[serde(rename = "type")]
    media_type: &'a str,
    sort: [&'a str; 1],
}

#[derive(Deserialize)]
struct GraphQLResponse {
    data: Option<PageData>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct PageData {
    #[serde(rename = "Page")]
    page: Option<MediaPage>,
}

#[derive(Clone)]
pub struct AnilistClient {
    client: Client,
    endpoint: String,
    policy: RateLimitPolicy,
}

impl AnilistClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            policy: config.rate_limit_policy(),
        })
    }

    #[must_use]
    pub const fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    pub async fn request_page(
        &self,
        kind: ContentKind,
        page: u32,
        per_page: u32,
        sort: SortStrategy,
    ) -> Result<FetchOutcome, CatalogError> {
        let request_body = GraphQLRequest {
            query: PAGE_QUERY,
            variables: PageVariables {
                page,
                per_page,
                media_type: kind.media_type(),
                sort: [sort.media_sort()],
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let rate_limit = RateLimitInfo::from_headers(response.headers());

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(
                kind = %kind,
                page,
                cooldown_secs = self.policy.cooldown.as_secs(),
                "Catalog rate limit hit, cooling down before retrying page"
            );
            metrics::counter!("anisync_rate_limit_waits_total", "kind" => kind.as_str())
                .increment(1);
            return Ok(FetchOutcome::RetryPage(self.policy.cooldown));
        }

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate_at_char_boundary(&mut body, MAX_ERROR_BODY);
            return Err(CatalogError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: GraphQLResponse = response.json().await?;

        if !payload.errors.is_empty() {
            return Err(CatalogError::Data {
                payload: serde_json::Value::Array(payload.errors),
            });
        }

        let media_page = payload
            .data
            .and_then(|d| d.page)
            .ok_or(CatalogError::Data {
                payload: serde_json::Value::Null,
            })?;

        debug!(
            kind = %kind,
            page,
            records = media_page.media.len(),
            remaining = ?rate_limit.remaining,
            "Fetched catalog page"
        );

        if let Some(delay) = self.policy.delay_for_response(&rate_limit) {
            info!(
                remaining = ?rate_limit.remaining,
                wait_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Rate limit budget low, pausing"
            );
            metrics::counter!("anisync_rate_limit_waits_total", "kind" => kind.as_str())
                .increment(1);
            tokio::time::sleep(delay).await;
        }

        Ok(FetchOutcome::Page(media_page))
    }
}

#[async_trait]
impl CatalogSource for AnilistClient {
    async fn fetch_page(
        &self,
        kind: ContentKind,
        page: u32,
        per_page: u32,
        sort: SortStrategy,
    ) -> Result<FetchOutcome, CatalogError> {
        self.request_page(kind, page, per_page, sort).await
    }
}

fn truncate_at_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_uses_graphql_variable_names() {
        let body = GraphQLRequest {
            query: PAGE_QUERY,
            variables: PageVariables {
                page: 3,
                per_page: 50,
                media_type: ContentKind::Manga.media_type(),
                sort: [SortStrategy::Popularity.media_sort()],
            },
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["variables"]["page"], 3);
        assert_eq!(json["variables"]["perPage"], 50);
        assert_eq!(json["variables"]["type"], "MANGA");
        assert_eq!(json["variables"]["sort"][0], "POPULARITY_DESC");
    }

    #[test]
    fn truncation_respects_utf8() {
        let mut s = "ああああ".to_string();
        truncate_at_char_boundary(&mut s, 4);
        assert_eq!(s, "あ");
    }
}
