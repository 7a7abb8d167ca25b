use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::{
    db::corpus::RankMetric,
    error::{AppError, AppResult},
    models::{
        MovieDetailResponse, MovieSummary, PersonCredit, QaResponse, QuestionRequest,
        RetrievalResult, SearchResponse, Source, StatsResponse,
    },
    services::{
        composer::COMPOSED_MOVIES, plan, rewrite_question, AnswerComposer, Strategy,
        StrategyPipeline,
    },
};

/// Hard cap on caller-supplied list sizes
pub const MAX_PAGE_SIZE: usize = 50;

/// Question answering, search and lookups over the corpus
#[derive(Clone)]
pub struct QaService {
    pipeline: StrategyPipeline,
    composer: Arc<dyn AnswerComposer>,
}

impl QaService {
    pub fn new(pipeline: StrategyPipeline, composer: Arc<dyn AnswerComposer>) -> Self {
        Self { pipeline, composer }
    }

    fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.pipeline.retriever().settings.result_limit)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// Answers one question, resolving references to earlier turns first
    pub async fn answer(&self, request: QuestionRequest) -> AppResult<QaResponse> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(AppError::InvalidInput("question must not be empty".to_string()));
        }

        let resolved = rewrite_question(question, &request.conversation_history);
        if resolved != question {
            tracing::debug!(question = %question, resolved = %resolved, "Resolved question against history");
        }

        let strategies = plan(&resolved);
        let result = self.pipeline.execute(&strategies).await?;
        let credits = self.top_credits(&result).await?;

        let answer = match self.composer.compose(&resolved, &result, &credits).await {
            Ok(answer) => Some(answer),
            Err(e) => {
                tracing::warn!(error = %e, "Answer composer failed, returning movies only");
                None
            }
        };

        tracing::info!(
            source = %result.source,
            confidence = result.confidence,
            movies = result.movies.len(),
            "Answered question"
        );
        Ok(QaResponse {
            answer,
            answer_movies: result.movies.iter().map(MovieSummary::from).collect(),
            source: result.source,
            confidence: result.confidence,
            resolved_question: resolved,
        })
    }

    async fn top_credits(
        &self,
        result: &RetrievalResult,
    ) -> AppResult<HashMap<i64, Vec<PersonCredit>>> {
        let store = &self.pipeline.retriever().store;
        let mut credits = HashMap::new();
        for scored in result.movies.iter().take(COMPOSED_MOVIES) {
            let id = scored.movie.tmdb_id;
            credits.insert(id, store.credits_for(id).await?);
        }
        Ok(credits)
    }

    /// Title search: keyword hits first, topped up with semantic neighbours
    pub async fn search(&self, q: &str, limit: Option<usize>) -> AppResult<SearchResponse> {
        let q = q.trim();
        if q.is_empty() {
            return Err(AppError::InvalidInput("query must not be empty".to_string()));
        }
        let limit = self.page_size(limit);
        let retriever = self.pipeline.retriever();

        let mut hits = retriever.store.find_by_title(q, limit).await?;
        let source = if hits.is_empty() {
            Source::Semantic
        } else {
            Source::Keyword
        };

        if hits.len() < limit {
            let strategy = Strategy::Semantic {
                text: q.to_string(),
            };
            match retriever.run(&strategy).await {
                Ok(semantic) => {
                    let mut seen: HashSet<i64> = hits.iter().map(|h| h.movie.tmdb_id).collect();
                    hits.extend(
                        semantic
                            .movies
                            .into_iter()
                            .filter(|m| seen.insert(m.movie.tmdb_id)),
                    );
                    hits.truncate(limit);
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(query = %q, error = %e, "Semantic search unavailable, keyword hits only");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(query = %q, results = hits.len(), source = %source, "Searched movies");
        let results: Vec<MovieSummary> = hits.iter().map(MovieSummary::from).collect();
        Ok(SearchResponse {
            total: results.len(),
            results,
            source,
        })
    }

    pub async fn movie_detail(&self, tmdb_id: i64) -> AppResult<MovieDetailResponse> {
        let store = &self.pipeline.retriever().store;
        let movie = store
            .find_by_id(tmdb_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Movie {} not found", tmdb_id)))?;
        let credits = store.credits_for(tmdb_id).await?;
        Ok(MovieDetailResponse::new(&movie, &credits))
    }

    pub async fn top(&self, metric: RankMetric, limit: Option<usize>) -> AppResult<Vec<MovieSummary>> {
        let movies = self
            .pipeline
            .retriever()
            .store
            .top_movies(metric, self.page_size(limit))
            .await?;
        Ok(movies.iter().map(MovieSummary::from).collect())
    }

    pub async fn stats(&self) -> AppResult<StatsResponse> {
        let retriever = self.pipeline.retriever();
        let counts = retriever.store.stats().await?;
        Ok(StatsResponse {
            movies: counts.movies,
            people: counts.people,
            credits: counts.credits,
            indexed_vectors: retriever.index.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{CorpusStore, InMemoryCorpusStore},
        models::{ChatTurn, Credit, Movie, MovieRecord, Person},
        services::{
            composer::MockAnswerComposer, embedding::MockEmbedder,
            providers::MockMetadataProvider, strategies::Retriever, EngineSettings,
            SemanticIndex, TemplateComposer,
        },
    };

    fn record(id: i64, title: &str, popularity: f64) -> MovieRecord {
        MovieRecord {
            movie: Movie {
                popularity,
                overview: Some(format!("About {}", title)),
                ..Movie::new(id, title)
            },
            people: Vec::new(),
            credits: Vec::new(),
        }
    }

    fn store() -> Arc<InMemoryCorpusStore> {
        let mut inception = record(27205, "Inception", 80.0);
        inception.people = vec![Person::new(525, "Christopher Nolan")];
        inception.credits = vec![Credit::director(27205, 525)];
        Arc::new(InMemoryCorpusStore::from_records(vec![
            inception,
            record(603, "The Matrix", 70.0),
            record(604, "The Matrix Reloaded", 40.0),
        ]))
    }

    fn offline_provider() -> MockMetadataProvider {
        let mut provider = MockMetadataProvider::new();
        provider.expect_name().return_const("tmdb");
        provider
            .expect_search_movies()
            .returning(|_| Err(AppError::ExternalApi("offline".to_string())));
        provider
    }

    fn service(
        store: Arc<dyn CorpusStore>,
        index: SemanticIndex,
        embedder: MockEmbedder,
        composer: Arc<dyn AnswerComposer>,
    ) -> QaService {
        let retriever = Retriever::new(
            store,
            Arc::new(index),
            Arc::new(embedder),
            Arc::new(offline_provider()),
            EngineSettings::default(),
        );
        QaService::new(StrategyPipeline::new(retriever), composer)
    }

    fn question(text: &str, history: Vec<ChatTurn>) -> QuestionRequest {
        QuestionRequest {
            question: text.to_string(),
            conversation_history: history,
        }
    }

    #[tokio::test]
    async fn test_answer_uses_director_credits() {
        let qa = service(store(), SemanticIndex::new(), MockEmbedder::new(), Arc::new(TemplateComposer));

        let response = qa.answer(question("Tell me about Inception", Vec::new())).await.unwrap();

        assert_eq!(response.source, Source::Keyword);
        assert_eq!(response.answer_movies[0].tmdb_id, 27205);
        assert!(response.answer.unwrap().contains("Directed by Christopher Nolan."));
    }

    #[tokio::test]
    async fn test_answer_resolves_pronoun_from_history() {
        let qa = service(store(), SemanticIndex::new(), MockEmbedder::new(), Arc::new(TemplateComposer));
        let history = vec![
            ChatTurn::user("Tell me about The Matrix"),
            ChatTurn::assistant("The Matrix (1999) is a science fiction film."),
        ];

        let response = qa.answer(question("Who directed it?", history)).await.unwrap();

        assert_eq!(response.resolved_question, "Who directed The Matrix?");
        assert_eq!(response.answer_movies[0].tmdb_id, 603);
    }

    #[tokio::test]
    async fn test_composer_failure_keeps_movies() {
        let mut composer = MockAnswerComposer::new();
        composer
            .expect_compose()
            .returning(|_, _, _| Err(AppError::ExternalApi("composer down".to_string())));
        let qa = service(store(), SemanticIndex::new(), MockEmbedder::new(), Arc::new(composer));

        let response = qa.answer(question("The Matrix", Vec::new())).await.unwrap();

        assert!(response.answer.is_none());
        assert!(!response.answer_movies.is_empty());
    }

    #[tokio::test]
    async fn test_blank_question_is_rejected() {
        let qa = service(store(), SemanticIndex::new(), MockEmbedder::new(), Arc::new(TemplateComposer));
        let err = qa.answer(question("   ", Vec::new())).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_search_fills_with_semantic_hits_without_duplicates() {
        let index = SemanticIndex::new();
        index.upsert(603, vec![1.0, 0.0]);
        index.upsert(27205, vec![0.9, 0.1]);
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(|_| Ok(vec![1.0, 0.0]));
        let qa = service(store(), index, embedder, Arc::new(TemplateComposer));

        let response = qa.search("Matrix", Some(5)).await.unwrap();

        let ids: Vec<i64> = response.results.iter().map(|m| m.tmdb_id).collect();
        assert_eq!(response.source, Source::Keyword);
        assert_eq!(ids.iter().filter(|id| **id == 603).count(), 1);
        assert!(ids.contains(&27205));
        assert_eq!(response.total, ids.len());
    }

    #[tokio::test]
    async fn test_search_survives_embedding_outage() {
        let index = SemanticIndex::new();
        index.upsert(603, vec![1.0, 0.0]);
        let mut embedder = MockEmbedder::new();
        embedder
            .expect_embed()
            .returning(|_| Err(AppError::UpstreamTimeout("embedding".to_string())));
        let qa = service(store(), index, embedder, Arc::new(TemplateComposer));

        let response = qa.search("Inception", None).await.unwrap();
        assert_eq!(response.results[0].tmdb_id, 27205);
    }

    #[tokio::test]
    async fn test_movie_detail_of_unknown_id_is_not_found() {
        let qa = service(store(), SemanticIndex::new(), MockEmbedder::new(), Arc::new(TemplateComposer));
        let err = qa.movie_detail(1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let detail = qa.movie_detail(27205).await.unwrap();
        assert_eq!(detail.directors, vec!["Christopher Nolan".to_string()]);
    }

    #[tokio::test]
    async fn test_stats_include_index_size() {
        let index = SemanticIndex::new();
        index.upsert(603, vec![1.0]);
        let qa = service(store(), index, MockEmbedder::new(), Arc::new(TemplateComposer));

        let stats = qa.stats().await.unwrap();
        assert_eq!(
            stats,
            StatsResponse {
                movies: 3,
                people: 1,
                credits: 1,
                indexed_vectors: 1
            }
        );
    }

    #[tokio::test]
    async fn test_top_by_popularity() {
        let qa = service(store(), SemanticIndex::new(), MockEmbedder::new(), Arc::new(TemplateComposer));
        let top = qa.top(RankMetric::Popularity, Some(2)).await.unwrap();
        let ids: Vec<i64> = top.iter().map(|m| m.tmdb_id).collect();
        assert_eq!(ids, vec![27205, 603]);
    }
}
