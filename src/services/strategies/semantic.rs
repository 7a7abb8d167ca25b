use std::collections::HashMap;

use super::{with_timeout, Retriever};
use crate::{
    error::AppResult,
    models::{RetrievalResult, ScoredMovie, Source},
    services::text::{contains_words, normalize},
};

/// Neighbours below this cosine similarity are noise, not matches
pub const MIN_SIMILARITY: f32 = 0.4;

/// Similarities closer than this are considered tied and ordered by popularity
pub const SIMILARITY_TIE_WINDOW: f32 = 0.01;

/// Short forms expanded before embedding. The first key found in the
/// question wins.
const QUERY_EXPANSIONS: &[(&str, &str)] = &[
    ("nolan", "christopher nolan director filmmaker"),
    ("tarantino", "quentin tarantino director filmmaker"),
    ("spielberg", "steven spielberg director filmmaker"),
    ("scorsese", "martin scorsese director filmmaker"),
    ("kubrick", "stanley kubrick director filmmaker"),
    ("fincher", "david fincher director filmmaker"),
    ("villeneuve", "denis villeneuve director filmmaker"),
    ("dicaprio", "leonardo dicaprio actor"),
    ("denzel", "denzel washington actor"),
    ("sci fi", "science fiction space futuristic technology"),
    ("scifi", "science fiction space futuristic technology"),
    ("action", "action adventure thriller exciting"),
    ("horror", "horror scary terror frightening suspense"),
    ("comedy", "comedy funny humor amusing hilarious"),
    ("drama", "drama emotional story character"),
    ("romance", "romance love relationship romantic"),
    ("space", "space cosmos universe galaxy planets astronomy"),
    ("war", "war military combat battle soldier"),
    ("love", "love romance relationship romantic affection"),
    ("crime", "crime criminal heist robbery detective"),
    ("time travel", "time travel temporal paradox future past"),
    ("marvel", "marvel cinematic universe mcu superhero avengers"),
    ("mcu", "marvel cinematic universe mcu superhero"),
    ("dc", "dc comics superhero batman superman wonder woman"),
    ("star wars", "star wars jedi sith force galaxy"),
];

/// Appends related terms for the first known short form in `text`
pub fn expand_query(text: &str) -> String {
    let normalized = normalize(text);
    QUERY_EXPANSIONS
        .iter()
        .find(|(key, _)| contains_words(&normalized, key))
        .map(|(_, expansion)| format!("{} {}", text, expansion))
        .unwrap_or_else(|| text.to_string())
}

/// Confidence of a neighbour: its cosine similarity, clamped to [0, 1].
/// Orthogonal vectors carry no confidence.
pub fn confidence(cosine: f32) -> f32 {
    cosine.clamp(0.0, 1.0)
}

/// Orders hits by similarity; runs of hits within the tie window of the
/// run's leader are reordered by popularity.
fn order_with_popularity_ties(mut hits: Vec<(ScoredMovie, f32)>) -> Vec<ScoredMovie> {
    hits.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut ordered = Vec::with_capacity(hits.len());
    let mut run: Vec<(ScoredMovie, f32)> = Vec::new();
    for hit in hits {
        if run.first().is_some_and(|(_, leader)| leader - hit.1 > SIMILARITY_TIE_WINDOW) {
            flush_run(&mut run, &mut ordered);
        }
        run.push(hit);
    }
    flush_run(&mut run, &mut ordered);
    ordered
}

fn flush_run(run: &mut Vec<(ScoredMovie, f32)>, ordered: &mut Vec<ScoredMovie>) {
    run.sort_by(|a, b| b.0.movie.popularity.total_cmp(&a.0.movie.popularity));
    ordered.extend(run.drain(..).map(|(movie, _)| movie));
}

/// Embeds the (expanded) question and looks up its nearest movies
pub async fn retrieve(retriever: &Retriever, text: &str) -> AppResult<RetrievalResult> {
    if retriever.index.is_empty() || text.trim().is_empty() {
        return Ok(RetrievalResult::empty(Source::Semantic));
    }

    let expanded = expand_query(text);
    let vector = with_timeout(
        retriever.settings.upstream_timeout,
        "embedding service",
        retriever.embedder.embed(&expanded),
    )
    .await?;

    let neighbours: Vec<(i64, f32)> = retriever
        .index
        .nearest(&vector, retriever.settings.semantic_top_k)
        .into_iter()
        .filter(|(_, similarity)| *similarity >= MIN_SIMILARITY)
        .collect();
    if neighbours.is_empty() {
        tracing::debug!(expanded = %expanded, "No neighbour above similarity floor");
        return Ok(RetrievalResult::empty(Source::Semantic));
    }

    let ids: Vec<i64> = neighbours.iter().map(|(id, _)| *id).collect();
    let mut movies: HashMap<i64, _> = retriever
        .store
        .find_by_ids(&ids)
        .await?
        .into_iter()
        .map(|m| (m.tmdb_id, m))
        .collect();

    let hits: Vec<(ScoredMovie, f32)> = neighbours
        .into_iter()
        .filter_map(|(id, similarity)| {
            movies.remove(&id).map(|movie| {
                (
                    ScoredMovie {
                        movie,
                        score: confidence(similarity),
                    },
                    similarity,
                )
            })
        })
        .collect();
    let top = confidence(hits.iter().map(|(_, s)| *s).fold(0.0_f32, f32::max));

    let mut ordered = order_with_popularity_ties(hits);
    ordered.truncate(retriever.settings.result_limit);

    tracing::debug!(
        expanded = %expanded,
        hits = ordered.len(),
        confidence = top,
        "Semantic search"
    );
    Ok(RetrievalResult::new(Source::Semantic, ordered, top))
}
