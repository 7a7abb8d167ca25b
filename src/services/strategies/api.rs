use super::{with_timeout, Retriever};
use crate::{
    error::AppResult,
    models::{Movie, RetrievalResult, ScoredMovie, Source, TmdbSearchHit},
    services::text::title_similarity,
};

/// Fixed confidence of a live provider lookup
pub const API_CONFIDENCE: f32 = 0.4;

/// The hit whose title best matches the guess; popularity breaks ties
fn best_hit(title: &str, hits: Vec<TmdbSearchHit>) -> Option<(TmdbSearchHit, f32)> {
    hits.into_iter()
        .map(|hit| {
            let similarity = title_similarity(title, &hit.title);
            (hit, similarity)
        })
        .max_by(|(a, sa), (b, sb)| {
            sa.total_cmp(sb)
                .then_with(|| a.popularity.total_cmp(&b.popularity))
        })
}

/// Embeds a freshly stored movie into the semantic index. Failures only
/// cost recall, so they are logged and dropped.
async fn index_movie(retriever: &Retriever, movie: &Movie) {
    if retriever.index.contains(movie.tmdb_id) {
        return;
    }
    let embedded = with_timeout(
        retriever.settings.upstream_timeout,
        "embedding service",
        retriever.embedder.embed(&movie.index_text()),
    )
    .await;

    match embedded {
        Ok(vector) => {
            retriever.index.upsert(movie.tmdb_id, vector);
            tracing::debug!(tmdb_id = movie.tmdb_id, "Indexed fetched movie");
        }
        Err(e) => {
            tracing::warn!(tmdb_id = movie.tmdb_id, error = %e, "Failed to index fetched movie");
        }
    }
}

/// Looks the title up at the metadata provider and writes the best hit
/// through into the corpus
pub async fn retrieve(retriever: &Retriever, title: &str) -> AppResult<RetrievalResult> {
    let provider = retriever.provider.as_ref();
    let timeout = retriever.settings.upstream_timeout;

    let hits = with_timeout(timeout, provider.name(), provider.search_movies(title)).await?;
    let Some((hit, similarity)) = best_hit(title, hits) else {
        tracing::debug!(title = %title, provider = provider.name(), "Provider has no match");
        return Ok(RetrievalResult::empty(Source::Api));
    };

    let details = with_timeout(timeout, provider.name(), provider.movie_details(hit.id)).await?;
    let record = details.into_record(provider.name());
    let movie = retriever.store.insert_movie_if_absent(record).await?;

    index_movie(retriever, &movie).await;

    tracing::info!(
        title = %title,
        tmdb_id = movie.tmdb_id,
        provider = provider.name(),
        "Fetched movie from provider"
    );
    Ok(RetrievalResult::new(
        Source::Api,
        vec![ScoredMovie {
            movie,
            score: similarity,
        }],
        API_CONFIDENCE,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: i64, title: &str, popularity: f64) -> TmdbSearchHit {
        TmdbSearchHit {
            id,
            title: title.to_string(),
            release_date: None,
            overview: None,
            popularity,
        }
    }

    #[test]
    fn test_best_hit_prefers_title_match_over_popularity() {
        let (best, similarity) = best_hit(
            "Heat",
            vec![hit(1, "Heatwave Chronicles", 90.0), hit(949, "Heat", 20.0)],
        )
        .unwrap();
        assert_eq!(best.id, 949);
        assert_eq!(similarity, 1.0);
    }

    #[test]
    fn test_best_hit_breaks_ties_by_popularity() {
        let (best, _) = best_hit("Dune", vec![hit(1, "Dune", 10.0), hit(2, "Dune", 60.0)]).unwrap();
        assert_eq!(best.id, 2);
    }

    #[test]
    fn test_best_hit_of_nothing_is_none() {
        assert!(best_hit("Dune", Vec::new()).is_none());
    }
}
