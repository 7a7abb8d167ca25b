use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::{Movie, PersonRole};

/// Name of the strategy that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Keyword,
    Semantic,
    Api,
    DirectorSearch,
    ActorSearch,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Keyword => "keyword",
            Source::Semantic => "semantic",
            Source::Api => "api",
            Source::DirectorSearch => "director_search",
            Source::ActorSearch => "actor_search",
        }
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<PersonRole> for Source {
    fn from(role: PersonRole) -> Self {
        match role {
            PersonRole::Director => Source::DirectorSearch,
            PersonRole::Actor => Source::ActorSearch,
        }
    }
}

/// A movie with the relevance score a strategy assigned to it
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMovie {
    pub movie: Movie,
    pub score: f32,
}

/// Ranked candidates from one strategy, with that strategy's confidence
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub movies: Vec<ScoredMovie>,
    pub source: Source,
    /// In [0, 1]; an ordering signal, not a calibrated probability
    pub confidence: f32,
}

impl RetrievalResult {
    pub fn new(source: Source, movies: Vec<ScoredMovie>, confidence: f32) -> Self {
        Self {
            movies,
            source,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn empty(source: Source) -> Self {
        Self::new(source, Vec::new(), 0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    pub fn truncate(mut self, limit: usize) -> Self {
        self.movies.truncate(limit);
        self
    }
}
