//! External movie metadata providers
//!
//! A provider answers live title searches and detail lookups for movies the
//! corpus does not hold yet. Whatever it returns may be written through into
//! the corpus, tagged with the provider's name.

use crate::{
    error::AppResult,
    models::{TmdbMovieDetails, TmdbSearchHit},
};

pub mod tmdb;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Search movies by title, best match first
    async fn search_movies(&self, query: &str) -> AppResult<Vec<TmdbSearchHit>>;

    /// Full details of one movie, including cast and crew
    async fn movie_details(&self, tmdb_id: i64) -> AppResult<TmdbMovieDetails>;

    /// Provider name, recorded as the `data_source` of persisted rows
    fn name(&self) -> &'static str;
}
