use serde::{Deserialize, Serialize};

use super::{ChatTurn, Movie, PersonCredit, ScoredMovie, Source};
use crate::db::corpus::RankMetric;

/// Request body for the question-answering endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatTurn>,
}

/// Movie as returned inside answers and search results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieSummary {
    pub tmdb_id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub overview: Option<String>,
    pub genres: Vec<String>,
    pub popularity: f64,
    pub vote_average: f64,
    pub box_office_worldwide: Option<f64>,
    pub box_office_domestic: Option<f64>,
    pub box_office_foreign: Option<f64>,
    /// Relevance assigned by the strategy that found the movie
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl From<&Movie> for MovieSummary {
    fn from(movie: &Movie) -> Self {
        Self {
            tmdb_id: movie.tmdb_id,
            title: movie.title.clone(),
            year: movie.year,
            overview: movie.overview.clone(),
            genres: movie.genre_names().map(str::to_string).collect(),
            popularity: movie.popularity,
            vote_average: movie.vote_average,
            box_office_worldwide: movie.box_office_worldwide,
            box_office_domestic: movie.box_office_domestic,
            box_office_foreign: movie.box_office_foreign,
            score: None,
        }
    }
}

impl From<&ScoredMovie> for MovieSummary {
    fn from(scored: &ScoredMovie) -> Self {
        Self {
            score: Some(scored.score),
            ..MovieSummary::from(&scored.movie)
        }
    }
}

/// Response body for the question-answering endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaResponse {
    /// Prose from the answer composer, absent if it failed
    pub answer: Option<String>,
    pub answer_movies: Vec<MovieSummary>,
    pub source: Source,
    pub confidence: f32,
    /// The self-contained question after resolving references to history
    pub resolved_question: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<MovieSummary>,
    pub total: usize,
    pub source: Source,
}

/// Query string of the top-movies endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopParams {
    #[serde(default)]
    pub by: RankMetric,
    pub limit: Option<usize>,
}

/// Corpus counts plus the size of the semantic index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub movies: i64,
    pub people: i64,
    pub credits: i64,
    pub indexed_vectors: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CastMember {
    pub name: String,
    pub character: Option<String>,
}

/// Movie detail with credits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieDetailResponse {
    #[serde(flatten)]
    pub movie: MovieSummary,
    pub runtime: Option<i32>,
    pub data_source: String,
    pub directors: Vec<String>,
    pub cast: Vec<CastMember>,
}

impl MovieDetailResponse {
    pub fn new(movie: &Movie, credits: &[PersonCredit]) -> Self {
        let directors = credits
            .iter()
            .filter(|c| c.credit.is_director())
            .map(|c| c.person.name.clone())
            .collect();

        let mut cast: Vec<&PersonCredit> = credits.iter().filter(|c| c.credit.is_cast()).collect();
        cast.sort_by_key(|c| c.credit.cast_order.unwrap_or(i32::MAX));

        Self {
            movie: MovieSummary::from(movie),
            runtime: movie.runtime,
            data_source: movie.data_source.clone(),
            directors,
            cast: cast
                .into_iter()
                .map(|c| CastMember {
                    name: c.person.name.clone(),
                    character: c.credit.character_name.clone(),
                })
                .collect(),
        }
    }
}
