use parking_lot::RwLock;
use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};

use super::{rank_people_matches, rank_title_matches, CorpusStats, CorpusStore, RankMetric};
use crate::{
    error::AppResult,
    models::{Credit, Movie, MovieRecord, Person, PersonCredit, PersonRole, RecommendationQuery, ScoredMovie},
};

#[derive(Default)]
struct Corpus {
    movies: BTreeMap<i64, Movie>,
    people: BTreeMap<i64, Person>,
    credits: Vec<Credit>,
}

impl Corpus {
    fn add_credit(&mut self, credit: Credit) {
        if !self.movies.contains_key(&credit.movie_tmdb_id)
            || !self.people.contains_key(&credit.person_tmdb_person_id)
        {
            tracing::warn!(
                movie = credit.movie_tmdb_id,
                person = credit.person_tmdb_person_id,
                "Skipping credit with dangling reference"
            );
            return;
        }
        if !self.credits.contains(&credit) {
            self.credits.push(credit);
        }
    }

    fn add_people(&mut self, people: Vec<Person>) {
        for person in people {
            self.people.entry(person.tmdb_person_id).or_insert(person);
        }
    }
}

/// Process-local corpus behind a read-write lock.
///
/// Serves the same contract as the Postgres store; used for tests and for
/// running the engine without a database.
#[derive(Default)]
pub struct InMemoryCorpusStore {
    inner: RwLock<Corpus>,
}

impl InMemoryCorpusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from complete records, replacing duplicates
    pub fn from_records(records: impl IntoIterator<Item = MovieRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.put_record(record);
        }
        store
    }

    /// Inserts or replaces a movie, then adds its people and credits
    pub fn put_record(&self, record: MovieRecord) {
        let mut corpus = self.inner.write();
        corpus.movies.insert(record.movie.tmdb_id, record.movie);
        corpus.add_people(record.people);
        for credit in record.credits {
            corpus.add_credit(credit);
        }
    }
}

#[async_trait::async_trait]
impl CorpusStore for InMemoryCorpusStore {
    async fn find_by_title(&self, text: &str, limit: usize) -> AppResult<Vec<ScoredMovie>> {
        let corpus = self.inner.read();
        Ok(rank_title_matches(text, corpus.movies.values().cloned(), limit))
    }

    async fn find_by_id(&self, tmdb_id: i64) -> AppResult<Option<Movie>> {
        Ok(self.inner.read().movies.get(&tmdb_id).cloned())
    }

    async fn find_by_ids(&self, tmdb_ids: &[i64]) -> AppResult<Vec<Movie>> {
        let corpus = self.inner.read();
        Ok(tmdb_ids
            .iter()
            .filter_map(|id| corpus.movies.get(id).cloned())
            .collect())
    }

    async fn search_people_by_name(&self, text: &str, limit: usize) -> AppResult<Vec<Person>> {
        let corpus = self.inner.read();
        Ok(rank_people_matches(text, corpus.people.values().cloned(), limit))
    }

    async fn credits_for(&self, tmdb_id: i64) -> AppResult<Vec<PersonCredit>> {
        let corpus = self.inner.read();
        let mut credits: Vec<PersonCredit> = corpus
            .credits
            .iter()
            .filter(|c| c.movie_tmdb_id == tmdb_id)
            .filter_map(|c| {
                corpus.people.get(&c.person_tmdb_person_id).map(|p| PersonCredit {
                    person: p.clone(),
                    credit: c.clone(),
                })
            })
            .collect();
        credits.sort_by_key(|c| (c.credit.credit_type.as_str(), c.credit.cast_order.unwrap_or(i32::MAX)));
        Ok(credits)
    }

    async fn movies_directed_or_acted_by(
        &self,
        tmdb_person_id: i64,
        role: Option<PersonRole>,
        limit: usize,
    ) -> AppResult<Vec<Movie>> {
        let corpus = self.inner.read();
        let movie_ids: BTreeSet<i64> = corpus
            .credits
            .iter()
            .filter(|c| c.person_tmdb_person_id == tmdb_person_id)
            .filter(|c| match role {
                Some(role) => role.matches(c),
                None => c.is_director() || c.is_cast(),
            })
            .map(|c| c.movie_tmdb_id)
            .collect();

        let mut movies: Vec<Movie> = movie_ids
            .iter()
            .filter_map(|id| corpus.movies.get(id).cloned())
            .collect();
        movies.sort_by(|a, b| b.popularity.total_cmp(&a.popularity));
        movies.truncate(limit);
        Ok(movies)
    }

    async fn query_by_filters(&self, query: &RecommendationQuery) -> AppResult<Vec<Movie>> {
        let corpus = self.inner.read();
        let mut movies: Vec<Movie> = corpus
            .movies
            .values()
            .filter(|m| query.matches(m))
            .cloned()
            .collect();
        movies.sort_by(|a, b| {
            b.popularity
                .total_cmp(&a.popularity)
                .then_with(|| b.vote_average.total_cmp(&a.vote_average))
        });
        movies.truncate(query.limit);
        Ok(movies)
    }

    async fn insert_movie_if_absent(&self, record: MovieRecord) -> AppResult<Movie> {
        let mut corpus = self.inner.write();
        let movie = match corpus.movies.entry(record.movie.tmdb_id) {
            Entry::Occupied(existing) => return Ok(existing.get().clone()),
            Entry::Vacant(slot) => slot.insert(record.movie).clone(),
        };

        corpus.add_people(record.people);
        for credit in record.credits {
            corpus.add_credit(credit);
        }
        Ok(movie)
    }

    async fn top_movies(&self, metric: RankMetric, limit: usize) -> AppResult<Vec<Movie>> {
        let corpus = self.inner.read();
        let mut movies: Vec<Movie> = match metric {
            RankMetric::Popularity => corpus.movies.values().cloned().collect(),
            RankMetric::BoxOffice => corpus
                .movies
                .values()
                .filter(|m| m.box_office_worldwide.is_some())
                .cloned()
                .collect(),
        };
        movies.sort_by(|a, b| match metric {
            RankMetric::Popularity => b.popularity.total_cmp(&a.popularity),
            RankMetric::BoxOffice => b
                .box_office_worldwide
                .unwrap_or_default()
                .total_cmp(&a.box_office_worldwide.unwrap_or_default()),
        });
        movies.truncate(limit);
        Ok(movies)
    }

    async fn all_movies(&self) -> AppResult<Vec<Movie>> {
        Ok(self.inner.read().movies.values().cloned().collect())
    }

    async fn stats(&self) -> AppResult<CorpusStats> {
        let corpus = self.inner.read();
        Ok(CorpusStats {
            movies: corpus.movies.len() as i64,
            people: corpus.people.len() as i64,
            credits: corpus.credits.len() as i64,
        })
    }
}
