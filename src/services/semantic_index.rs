//! In-memory vector index over movie embeddings.

use futures::{stream, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path};

use crate::{
    db::CorpusStore,
    error::{AppError, AppResult},
    services::Embedder,
};

/// Embedding requests in flight while building the index
const BUILD_CONCURRENCY: usize = 8;

/// Failures in a row after which the embedding service is taken to be down
pub const MAX_CONSECUTIVE_FAILURES: usize = 16;

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    tmdb_id: i64,
    vector: Vec<f32>,
}

/// Cosine-similarity nearest-neighbour index keyed by `tmdb_id`
#[derive(Default)]
pub struct SemanticIndex {
    vectors: RwLock<HashMap<i64, Vec<f32>>>,
}

impl SemanticIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the vector stored for a movie
    pub fn upsert(&self, tmdb_id: i64, vector: Vec<f32>) {
        self.vectors.write().insert(tmdb_id, vector);
    }

    /// The `k` most similar movies, most similar first; ties go to the lower id
    pub fn nearest(&self, query: &[f32], k: usize) -> Vec<(i64, f32)> {
        let vectors = self.vectors.read();
        let mut scored: Vec<(i64, f32)> = vectors
            .iter()
            .map(|(id, v)| (*id, cosine_similarity(query, v)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
    }

    pub fn len(&self) -> usize {
        self.vectors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.read().is_empty()
    }

    pub fn contains(&self, tmdb_id: i64) -> bool {
        self.vectors.read().contains_key(&tmdb_id)
    }

    /// Embeds every stored movie that is not indexed yet.
    ///
    /// Movies whose embedding fails are skipped and logged; after
    /// [`MAX_CONSECUTIVE_FAILURES`] in a row the build is abandoned with
    /// whatever was indexed so far. A store failure aborts the build.
    /// Returns the number of movies added.
    pub async fn build_from_store(
        &self,
        store: &dyn CorpusStore,
        embedder: &dyn Embedder,
    ) -> AppResult<usize> {
        let pending: Vec<_> = store
            .all_movies()
            .await?
            .into_iter()
            .filter(|m| !self.contains(m.tmdb_id))
            .collect();

        tracing::info!(movies = pending.len(), "Building semantic index");

        let mut results = stream::iter(pending)
            .map(|movie| async move {
                let vector = embedder.embed(&movie.index_text()).await;
                (movie.tmdb_id, vector)
            })
            .buffer_unordered(BUILD_CONCURRENCY);

        let mut added = 0;
        let mut failed = 0;
        let mut consecutive = 0;
        while let Some((tmdb_id, result)) = results.next().await {
            match result {
                Ok(vector) => {
                    self.upsert(tmdb_id, vector);
                    added += 1;
                    consecutive = 0;
                }
                Err(e) => {
                    tracing::warn!(tmdb_id, error = %e, "Failed to embed movie");
                    failed += 1;
                    consecutive += 1;
                    if consecutive >= MAX_CONSECUTIVE_FAILURES {
                        tracing::error!(
                            added,
                            failed,
                            "Embedding service unavailable, abandoning index build"
                        );
                        return Ok(added);
                    }
                }
            }
        }

        tracing::info!(added, failed, total = self.len(), "Semantic index built");
        Ok(added)
    }

    /// Loads vectors from a JSON snapshot, returning how many were read
    pub fn load_snapshot(&self, path: &Path) -> AppResult<usize> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            AppError::Internal(format!("Failed to read index snapshot {}: {}", path.display(), e))
        })?;
        let entries: Vec<SnapshotEntry> = serde_json::from_str(&data)
            .map_err(|e| AppError::Internal(format!("Corrupt index snapshot: {}", e)))?;

        let count = entries.len();
        let mut vectors = self.vectors.write();
        for entry in entries {
            vectors.insert(entry.tmdb_id, entry.vector);
        }
        Ok(count)
    }

    pub fn save_snapshot(&self, path: &Path) -> AppResult<()> {
        let entries: Vec<SnapshotEntry> = self
            .vectors
            .read()
            .iter()
            .map(|(id, v)| SnapshotEntry {
                tmdb_id: *id,
                vector: v.clone(),
            })
            .collect();

        let data = serde_json::to_string(&entries)
            .map_err(|e| AppError::Internal(format!("Index serialization error: {}", e)))?;
        std::fs::write(path, data).map_err(|e| {
            AppError::Internal(format!("Failed to write index snapshot {}: {}", path.display(), e))
        })?;

        tracing::info!(path = %path.display(), vectors = entries.len(), "Saved index snapshot");
        Ok(())
    }
}

/// Cosine similarity in [-1, 1]; 0 for mismatched or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::InMemoryCorpusStore,
        models::{Movie, MovieRecord},
        services::embedding::MockEmbedder,
    };

    #[test]
    fn test_nearest_orders_by_cosine() {
        let index = SemanticIndex::new();
        index.upsert(1, vec![1.0, 0.0]);
        index.upsert(2, vec![0.7, 0.7]);
        index.upsert(3, vec![-1.0, 0.0]);

        let hits = index.nearest(&[1.0, 0.1], 2);
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![1, 2]);
        assert!(hits[0].1 > hits[1].1);
    }

    #[test]
    fn test_upsert_replaces_existing_vector() {
        let index = SemanticIndex::new();
        index.upsert(1, vec![1.0, 0.0]);
        index.upsert(1, vec![0.0, 1.0]);
        assert_eq!(index.len(), 1);
        assert!((index.nearest(&[0.0, 1.0], 1)[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_of_mismatched_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let path = std::env::temp_dir().join(format!("index-{}.json", uuid::Uuid::new_v4()));
        let index = SemanticIndex::new();
        index.upsert(603, vec![0.5, 0.5]);
        index.save_snapshot(&path).unwrap();

        let restored = SemanticIndex::new();
        assert_eq!(restored.load_snapshot(&path).unwrap(), 1);
        assert!(restored.contains(603));
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_build_skips_failed_embeddings() {
        let store = InMemoryCorpusStore::from_records(vec![
            MovieRecord {
                movie: Movie::new(1, "Good"),
                people: Vec::new(),
                credits: Vec::new(),
            },
            MovieRecord {
                movie: Movie::new(2, "Bad"),
                people: Vec::new(),
                credits: Vec::new(),
            },
        ]);

        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(|text| {
            if text.starts_with("Bad") {
                Err(AppError::UpstreamTimeout("embedding".to_string()))
            } else {
                Ok(vec![1.0, 0.0])
            }
        });

        let index = SemanticIndex::new();
        let added = index.build_from_store(&store, &embedder).await.unwrap();

        assert_eq!(added, 1);
        assert!(index.contains(1));
        assert!(!index.contains(2));
    }

    #[tokio::test]
    async fn test_build_gives_up_on_dead_embedding_service() {
        let store = InMemoryCorpusStore::from_records((1..=500).map(|id| MovieRecord {
            movie: Movie::new(id, format!("Movie {}", id)),
            people: Vec::new(),
            credits: Vec::new(),
        }));

        let mut embedder = MockEmbedder::new();
        embedder
            .expect_embed()
            .times(MAX_CONSECUTIVE_FAILURES..=MAX_CONSECUTIVE_FAILURES + BUILD_CONCURRENCY)
            .returning(|_| Err(AppError::UpstreamTimeout("embedding".to_string())));

        let index = SemanticIndex::new();
        let added = index.build_from_store(&store, &embedder).await.unwrap();

        assert_eq!(added, 0);
        assert!(index.is_empty());
    }
}
