use std::sync::Arc;

use crate::{
    db::CorpusStore,
    error::AppResult,
    models::{RecommendationQuery, RecommendationRequest, RecommendationResponse},
};

/// Billed cast members shown on a recommendation card
const CARD_CAST: usize = 5;

/// Stateless single-movie recommender.
///
/// "Search more" is driven by the caller: it appends the previous pick to
/// `exclude` and resubmits the same filters.
#[derive(Clone)]
pub struct RecommendationService {
    store: Arc<dyn CorpusStore>,
}

impl RecommendationService {
    pub fn new(store: Arc<dyn CorpusStore>) -> Self {
        Self { store }
    }

    /// The most popular movie matching every filter, or `None` when the
    /// filters (after exclusions) match nothing
    pub async fn recommend(
        &self,
        request: RecommendationRequest,
    ) -> AppResult<Option<RecommendationResponse>> {
        let query = RecommendationQuery::from(request);
        let Some(movie) = self.store.query_by_filters(&query).await?.into_iter().next() else {
            tracing::info!(
                genres = ?query.genres,
                years = ?query.years,
                excluded = query.exclude.len(),
                "No recommendation left for filters"
            );
            return Ok(None);
        };

        let mut cast: Vec<_> = self
            .store
            .credits_for(movie.tmdb_id)
            .await?
            .into_iter()
            .filter(|c| c.credit.is_cast())
            .collect();
        cast.sort_by_key(|c| c.credit.cast_order.unwrap_or(i32::MAX));
        let cast = cast
            .into_iter()
            .take(CARD_CAST)
            .map(|c| c.person.name)
            .collect();

        tracing::info!(tmdb_id = movie.tmdb_id, title = %movie.title, "Recommended movie");
        Ok(Some(RecommendationResponse::new(&movie, cast)))
    }
}
