use std::time::Duration;

pub mod classifier;
pub mod composer;
pub mod context;
pub mod embedding;
pub mod pipeline;
pub mod providers;
pub mod qa;
pub mod recommendations;
pub mod semantic_index;
pub mod strategies;
pub mod text;

pub use classifier::{plan, Strategy};
pub use composer::{AnswerComposer, TemplateComposer};
pub use context::rewrite_question;
pub use embedding::{Embedder, HttpEmbedder};
pub use pipeline::StrategyPipeline;
pub use providers::{tmdb::TmdbProvider, MetadataProvider};
pub use qa::QaService;
pub use recommendations::RecommendationService;
pub use semantic_index::SemanticIndex;

/// Tunables shared by the retrieval strategies and the pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// A strategy is accepted outright when its confidence exceeds this
    pub acceptance_threshold: f32,
    /// Deadline for each call to the embedding service or metadata provider
    pub upstream_timeout: Duration,
    /// Neighbours fetched from the semantic index per query
    pub semantic_top_k: usize,
    /// Movies returned to the caller per answer
    pub result_limit: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.6,
            upstream_timeout: Duration::from_secs(5),
            semantic_top_k: 20,
            result_limit: 5,
        }
    }
}
