//! Corpus Store: read access to movies, people and credits, plus the single
//! write path used by the external-API write-through cache.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::{
    error::AppResult,
    models::{Movie, MovieRecord, Person, PersonCredit, PersonRole, RecommendationQuery, ScoredMovie},
    services::text::{name_match, title_similarity, NameMatch},
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryCorpusStore;
pub use postgres::PgCorpusStore;

/// Title matches scoring below this are not returned
pub const MIN_TITLE_SIMILARITY: f32 = 0.35;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub movies: i64,
    pub people: i64,
    pub credits: i64,
}

/// Ordering for aggregate "top movies" queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    #[default]
    Popularity,
    BoxOffice,
}

/// Storage backend for the movie corpus
///
/// Implementations must be safe for concurrent readers. Every method failing
/// with an error means the store itself is unavailable.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CorpusStore: Send + Sync {
    /// Fuzzy, case- and diacritic-insensitive title search
    ///
    /// Most similar first; equal similarity is broken by higher popularity.
    async fn find_by_title(&self, text: &str, limit: usize) -> AppResult<Vec<ScoredMovie>>;

    async fn find_by_id(&self, tmdb_id: i64) -> AppResult<Option<Movie>>;

    /// Fetches several movies at once; missing ids are skipped, order is unspecified
    async fn find_by_ids(&self, tmdb_ids: &[i64]) -> AppResult<Vec<Movie>>;

    /// People whose name contains the searched name, exact matches first
    async fn search_people_by_name(&self, text: &str, limit: usize) -> AppResult<Vec<Person>>;

    /// Cast and crew of a movie joined with the credited people
    async fn credits_for(&self, tmdb_id: i64) -> AppResult<Vec<PersonCredit>>;

    /// Movies a person directed (or acted in), most popular first. `None`
    /// follows both kinds of credit.
    async fn movies_directed_or_acted_by(
        &self,
        tmdb_person_id: i64,
        role: Option<PersonRole>,
        limit: usize,
    ) -> AppResult<Vec<Movie>>;

    /// Movies matching every filter category, most popular first, with the
    /// exclusion set already removed
    async fn query_by_filters(&self, query: &RecommendationQuery) -> AppResult<Vec<Movie>>;

    /// Atomically inserts a movie with its people and credits unless a movie
    /// with the same `tmdb_id` exists; returns the stored movie either way
    async fn insert_movie_if_absent(&self, record: MovieRecord) -> AppResult<Movie>;

    async fn top_movies(&self, metric: RankMetric, limit: usize) -> AppResult<Vec<Movie>>;

    /// Every movie, for building the semantic index
    async fn all_movies(&self) -> AppResult<Vec<Movie>>;

    async fn stats(&self) -> AppResult<CorpusStats>;
}

fn by_popularity_desc(a: &Movie, b: &Movie) -> Ordering {
    b.popularity.total_cmp(&a.popularity)
}

/// Scores candidate movies against a searched title and keeps the best
pub fn rank_title_matches(
    query: &str,
    candidates: impl IntoIterator<Item = Movie>,
    limit: usize,
) -> Vec<ScoredMovie> {
    let mut scored: Vec<ScoredMovie> = candidates
        .into_iter()
        .map(|movie| ScoredMovie {
            score: title_similarity(query, &movie.title),
            movie,
        })
        .filter(|s| s.score >= MIN_TITLE_SIMILARITY)
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| by_popularity_desc(&a.movie, &b.movie))
    });
    scored.truncate(limit);
    scored
}

/// Keeps people whose name matches the searched one, exact matches first
pub fn rank_people_matches(
    query: &str,
    candidates: impl IntoIterator<Item = Person>,
    limit: usize,
) -> Vec<Person> {
    let mut matched: Vec<(NameMatch, Person)> = candidates
        .into_iter()
        .map(|p| (name_match(query, &p.name), p))
        .filter(|(m, _)| *m != NameMatch::None)
        .collect();

    matched.sort_by(|(ma, pa), (mb, pb)| mb.cmp(ma).then_with(|| pa.name.cmp(&pb.name)));
    matched.truncate(limit);
    matched.into_iter().map(|(_, p)| p).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(id: i64, title: &str, popularity: f64) -> Movie {
        Movie {
            popularity,
            ..Movie::new(id, title)
        }
    }

    #[test]
    fn test_rank_title_matches_breaks_ties_by_popularity() {
        let ranked = rank_title_matches(
            "Dune",
            vec![movie(1, "Dune", 10.0), movie(2, "Dune", 90.0), movie(3, "Heat", 99.0)],
            5,
        );
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].movie.tmdb_id, 2);
        assert_eq!(ranked[1].movie.tmdb_id, 1);
    }

    #[test]
    fn test_rank_title_matches_prefers_exact_over_popular_partial() {
        let ranked = rank_title_matches(
            "The Matrix",
            vec![movie(604, "The Matrix Reloaded", 80.0), movie(603, "The Matrix", 60.0)],
            5,
        );
        assert_eq!(ranked[0].movie.tmdb_id, 603);
        assert!(ranked[0].score >= 0.95);
    }

    #[test]
    fn test_rank_people_matches_puts_exact_first() {
        let ranked = rank_people_matches(
            "Chris Evans",
            vec![
                Person::new(1, "Chris Evans Jr"),
                Person::new(2, "Chris Evans"),
                Person::new(3, "Christopher Nolan"),
            ],
            10,
        );
        let ids: Vec<i64> = ranked.iter().map(|p| p.tmdb_person_id).collect();
        assert_eq!(ids, vec![2, 1]);
    }
}
