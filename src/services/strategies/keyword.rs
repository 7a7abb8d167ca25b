use crate::{
    db::CorpusStore,
    error::AppResult,
    models::{RetrievalResult, Source},
};

/// Fuzzy title search; confidence is the best match's similarity
pub async fn retrieve(
    store: &dyn CorpusStore,
    title: &str,
    limit: usize,
) -> AppResult<RetrievalResult> {
    let hits = store.find_by_title(title, limit).await?;
    let confidence = hits.first().map_or(0.0, |h| h.score);

    tracing::debug!(title = %title, hits = hits.len(), confidence, "Keyword search");
    Ok(RetrievalResult::new(Source::Keyword, hits, confidence))
}
