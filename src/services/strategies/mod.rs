//! Retrieval strategies. Each turns one [`Strategy`] into a ranked
//! candidate list with a confidence.

use std::{future::Future, sync::Arc, time::Duration};

use crate::{
    db::CorpusStore,
    error::{AppError, AppResult},
    models::RetrievalResult,
    services::{EngineSettings, Embedder, MetadataProvider, SemanticIndex, Strategy},
};

pub mod api;
pub mod keyword;
pub mod person;
pub mod semantic;

/// Bounds an upstream call; elapsed deadlines become `UpstreamTimeout`
pub async fn with_timeout<T>(
    limit: Duration,
    upstream: &str,
    call: impl Future<Output = AppResult<T>>,
) -> AppResult<T> {
    tokio::time::timeout(limit, call).await.map_err(|_| {
        AppError::UpstreamTimeout(format!("{} did not answer within {:?}", upstream, limit))
    })?
}

/// Everything a strategy may read from or write to
#[derive(Clone)]
pub struct Retriever {
    pub store: Arc<dyn CorpusStore>,
    pub index: Arc<SemanticIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub provider: Arc<dyn MetadataProvider>,
    pub settings: EngineSettings,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn CorpusStore>,
        index: Arc<SemanticIndex>,
        embedder: Arc<dyn Embedder>,
        provider: Arc<dyn MetadataProvider>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
            provider,
            settings,
        }
    }

    /// Runs one strategy. Errors are returned as-is; deciding which ones to
    /// absorb is the pipeline's job.
    pub async fn run(&self, strategy: &Strategy) -> AppResult<RetrievalResult> {
        match strategy {
            Strategy::Keyword { title } => {
                keyword::retrieve(self.store.as_ref(), title, self.settings.result_limit).await
            }
            Strategy::Semantic { text } => semantic::retrieve(self, text).await,
            Strategy::Person { role, name } => {
                person::retrieve(self.store.as_ref(), *role, name, self.settings.result_limit).await
            }
            Strategy::Api { title } => api::retrieve(self, title).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_maps_elapsed_to_upstream_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, AppError>(1)
        };
        let err = with_timeout(Duration::from_millis(10), "embedding", slow)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamTimeout(_)));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_inner_result_through() {
        let value = with_timeout(Duration::from_secs(1), "tmdb", async { Ok::<_, AppError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
