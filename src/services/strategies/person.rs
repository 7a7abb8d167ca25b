use std::collections::HashSet;

use crate::{
    db::CorpusStore,
    error::AppResult,
    models::{Movie, Person, PersonRole, RetrievalResult, ScoredMovie, Source},
    services::text::{name_match, NameMatch},
};

/// People considered per searched name
const MAX_MATCHED_PEOPLE: usize = 10;

/// Confidence for `n` people sharing the searched name: 1.0 when the name is
/// unambiguous, shrinking with every additional namesake
pub fn ambiguity_confidence(matches: usize) -> f32 {
    if matches == 0 {
        0.0
    } else {
        1.0 / matches as f32
    }
}

/// Exact namesakes when there are any, otherwise every partial match
fn narrow_to_exact(name: &str, people: Vec<Person>) -> Vec<Person> {
    let exact: Vec<Person> = people
        .iter()
        .filter(|p| name_match(name, &p.name) == NameMatch::Exact)
        .cloned()
        .collect();
    if exact.is_empty() {
        people
    } else {
        exact
    }
}

/// Movies directed by (or starring) the people matching `name`
pub async fn retrieve(
    store: &dyn CorpusStore,
    role: PersonRole,
    name: &str,
    limit: usize,
) -> AppResult<RetrievalResult> {
    let source = Source::from(role);
    let people = narrow_to_exact(name, store.search_people_by_name(name, MAX_MATCHED_PEOPLE).await?);
    if people.is_empty() {
        return Ok(RetrievalResult::empty(source));
    }

    let confidence = ambiguity_confidence(people.len());
    if people.len() > 1 {
        tracing::info!(
            name = %name,
            matches = people.len(),
            confidence,
            "Ambiguous person name, lowering confidence"
        );
    }

    let mut seen = HashSet::new();
    let mut movies: Vec<Movie> = Vec::new();
    for person in &people {
        for movie in store
            .movies_directed_or_acted_by(person.tmdb_person_id, Some(role), limit)
            .await?
        {
            if seen.insert(movie.tmdb_id) {
                movies.push(movie);
            }
        }
    }

    if movies.is_empty() {
        return Ok(RetrievalResult::empty(source));
    }

    movies.sort_by(|a, b| b.popularity.total_cmp(&a.popularity));
    movies.truncate(limit);

    let hits = movies
        .into_iter()
        .map(|movie| ScoredMovie {
            movie,
            score: confidence,
        })
        .collect();
    Ok(RetrievalResult::new(source, hits, confidence))
}
