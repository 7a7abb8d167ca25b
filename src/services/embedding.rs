//! Client for the black-box `embed(text) → vector` service.

use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
};

const EMBEDDING_CACHE_TTL: u64 = 604800; // 1 week

/// Longest input sent to the embedding service, in bytes
const MAX_EMBED_CHARS: usize = 3_000;

/// Turns text into a dense vector
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>>;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    truncate: bool,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Embedder speaking the Ollama `/api/embed` protocol
#[derive(Clone)]
pub struct HttpEmbedder {
    http_client: HttpClient,
    base_url: String,
    model: String,
    cache: Cache,
}

impl HttpEmbedder {
    pub fn new(cache: Cache, base_url: String, model: String, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            cache,
        })
    }

    async fn request_embedding(&self, text: &str) -> AppResult<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url);
        let request = EmbedRequest {
            model: &self.model,
            input: vec![truncate_for_embedding(text)],
            truncate: true,
        };

        let response = self.http_client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Embedding service returned status {}: {}",
                status, body
            )));
        }

        let body: EmbedResponse = response.json().await?;
        body.embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::ExternalApi("Embedding service returned no vector".to_string()))
    }
}

#[async_trait::async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(AppError::InvalidInput("Cannot embed empty text".to_string()));
        }

        let key = CacheKey::Embedding {
            model: self.model.clone(),
            text: text.to_string(),
        };
        cached!(self.cache, key, EMBEDDING_CACHE_TTL, self.request_embedding(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embedder(server: &MockServer) -> HttpEmbedder {
        HttpEmbedder::new(
            Cache::disabled(),
            server.uri(),
            "all-minilm".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_embed_posts_model_and_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(serde_json::json!({
                "model": "all-minilm",
                "input": ["dream heist"]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "embeddings": [[0.1, 0.2, 0.3]] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let vector = embedder(&server).embed("dream heist").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_embed_maps_server_error_to_external_api() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let err = embedder(&server).embed("anything").await.unwrap_err();
        assert!(matches!(err, AppError::ExternalApi(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_embed_rejects_empty_vector_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "embeddings": [] })),
            )
            .mount(&server)
            .await;

        let err = embedder(&server).embed("anything").await.unwrap_err();
        assert!(matches!(err, AppError::ExternalApi(_)));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "é".repeat(MAX_EMBED_CHARS);
        let truncated = truncate_for_embedding(&text);
        assert!(truncated.len() <= MAX_EMBED_CHARS);
        assert!(truncated.chars().all(|c| c == 'é'));
    }
}
