use crate::{
    error::AppResult,
    models::{RetrievalResult, Source},
    services::{strategies::Retriever, Strategy},
};

/// Runs a strategy plan and picks the answer.
///
/// The first strategy whose confidence exceeds the acceptance threshold with
/// at least one candidate wins. Otherwise the most confident non-empty
/// outcome is returned (earlier strategies win ties). The provider lookup is
/// skipped once any earlier strategy produced candidates.
///
/// Recoverable failures (upstream timeouts, provider and embedding errors)
/// count as an empty, zero-confidence outcome; store failures abort.
#[derive(Clone)]
pub struct StrategyPipeline {
    retriever: Retriever,
}

impl StrategyPipeline {
    pub fn new(retriever: Retriever) -> Self {
        Self { retriever }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub async fn execute(&self, plan: &[Strategy]) -> AppResult<RetrievalResult> {
        let settings = self.retriever.settings;
        let mut best: Option<RetrievalResult> = None;
        let mut last_source = Source::Semantic;

        for strategy in plan {
            let source = strategy.source();
            if matches!(strategy, Strategy::Api { .. }) && best.is_some() {
                tracing::debug!("Skipping provider lookup, earlier strategies found candidates");
                continue;
            }

            let outcome = match self.retriever.run(strategy).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(strategy = %source, error = %e, "Strategy failed, falling through");
                    RetrievalResult::empty(source)
                }
                Err(e) => {
                    tracing::error!(strategy = %source, error = %e, "Strategy failed fatally");
                    return Err(e);
                }
            };
            last_source = source;

            tracing::info!(
                strategy = %source,
                confidence = outcome.confidence,
                candidates = outcome.movies.len(),
                "Strategy attempted"
            );

            if outcome.is_empty() {
                continue;
            }
            if outcome.confidence > settings.acceptance_threshold {
                return Ok(outcome.truncate(settings.result_limit));
            }
            if best
                .as_ref()
                .map_or(true, |b| outcome.confidence > b.confidence)
            {
                best = Some(outcome);
            }
        }

        let result = best.unwrap_or_else(|| RetrievalResult::empty(last_source));
        tracing::info!(
            source = %result.source,
            confidence = result.confidence,
            "No strategy accepted, returning best effort"
        );
        Ok(result.truncate(settings.result_limit))
    }
}
