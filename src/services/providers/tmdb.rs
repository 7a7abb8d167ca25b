//! TMDb API provider
//!
//! API Flow:
//! 1. Title Search: /search/movie?query=… → ids, titles, popularity
//! 2. Details: /movie/{id}?append_to_response=credits → full record with cast and crew
//!
//! Both responses are cached in Redis when a cache is configured.

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{TmdbMovieDetails, TmdbSearchHit, TmdbSearchResponse, TMDB_SOURCE},
    services::providers::MetadataProvider,
};
use reqwest::Client as HttpClient;
use std::time::Duration;

const SEARCH_CACHE_TTL: u64 = 3600; // 1 hour
const DETAILS_CACHE_TTL: u64 = 604800; // 1 week

#[derive(Clone)]
pub struct TmdbProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    cache: Cache,
}

impl TmdbProvider {
    pub fn new(cache: Cache, api_key: String, api_url: String, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            cache,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> AppResult<T> {
        let url = format!("{}{}", self.api_url, path);

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "TMDb API returned status {}: {}",
                status, body
            )));
        }

        let body = response.json().await?;
        Ok(body)
    }
}

#[async_trait::async_trait]
impl MetadataProvider for TmdbProvider {
    async fn search_movies(&self, query: &str) -> AppResult<Vec<TmdbSearchHit>> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Search query cannot be empty".to_string(),
            ));
        }

        let key = CacheKey::TmdbSearch(query.to_string());
        cached!(self.cache, key, SEARCH_CACHE_TTL, async move {
            let response: TmdbSearchResponse = self
                .get_json(
                    "/search/movie",
                    &[("query", query), ("include_adult", "false")],
                )
                .await?;

            tracing::info!(
                query = %query,
                results = response.results.len(),
                provider = TMDB_SOURCE,
                "Title search completed"
            );

            Ok::<_, AppError>(response.results)
        })
    }

    async fn movie_details(&self, tmdb_id: i64) -> AppResult<TmdbMovieDetails> {
        let key = CacheKey::TmdbMovie(tmdb_id);
        cached!(self.cache, key, DETAILS_CACHE_TTL, async move {
            let path = format!("/movie/{}", tmdb_id);
            let details: TmdbMovieDetails = self
                .get_json(&path, &[("append_to_response", "credits")])
                .await?;

            tracing::debug!(tmdb_id, title = %details.title, "Fetched movie details");
            Ok::<_, AppError>(details)
        })
    }

    fn name(&self) -> &'static str {
        TMDB_SOURCE
    }
}
