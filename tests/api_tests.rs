use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use peninemate_api::{
    db::InMemoryCorpusStore,
    error::{AppError, AppResult},
    models::{Credit, Genre, Movie, MovieRecord, Person, TmdbMovieDetails, TmdbSearchHit},
    routes::{create_router, AppState},
    services::{
        strategies::Retriever, Embedder, EngineSettings, MetadataProvider, QaService,
        RecommendationService, SemanticIndex, StrategyPipeline, TemplateComposer,
    },
};

struct UnitEmbedder;

#[async_trait::async_trait]
impl Embedder for UnitEmbedder {
    async fn embed(&self, _text: &str) -> AppResult<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }
}

struct OfflineProvider;

#[async_trait::async_trait]
impl MetadataProvider for OfflineProvider {
    async fn search_movies(&self, _query: &str) -> AppResult<Vec<TmdbSearchHit>> {
        Err(AppError::ExternalApi("offline".to_string()))
    }

    async fn movie_details(&self, tmdb_id: i64) -> AppResult<TmdbMovieDetails> {
        Err(AppError::NotFound(format!("movie {}", tmdb_id)))
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}

fn movie(id: i64, title: &str, year: i32, genre: &str, runtime: i32, popularity: f64) -> Movie {
    Movie {
        year: Some(year),
        runtime: Some(runtime),
        popularity,
        vote_average: 7.5,
        overview: Some(format!("{} overview", title)),
        genres_json: vec![Genre {
            id: 0,
            name: genre.to_string(),
        }],
        ..Movie::new(id, title)
    }
}

fn app() -> Router {
    let nolan = Person::new(525, "Christopher Nolan");
    let dicaprio = Person::new(6193, "Leonardo DiCaprio");
    let records = vec![
        MovieRecord {
            movie: movie(27205, "Inception", 2010, "Science Fiction", 148, 80.0),
            people: vec![nolan.clone(), dicaprio],
            credits: vec![
                Credit::director(27205, 525),
                Credit::cast(27205, 6193, Some("Cobb".to_string()), 0),
            ],
        },
        MovieRecord {
            movie: movie(157336, "Interstellar", 2014, "Science Fiction", 169, 90.0),
            people: vec![nolan],
            credits: vec![Credit::director(157336, 525)],
        },
        MovieRecord {
            movie: movie(2667, "The Blair Witch Project", 1999, "Horror", 81, 20.0),
            people: Vec::new(),
            credits: Vec::new(),
        },
    ];
    let store = Arc::new(InMemoryCorpusStore::from_records(records));

    let index = SemanticIndex::new();
    index.upsert(157336, vec![1.0, 0.0]);
    index.upsert(27205, vec![0.0, 1.0]);

    let retriever = Retriever::new(
        store.clone(),
        Arc::new(index),
        Arc::new(UnitEmbedder),
        Arc::new(OfflineProvider),
        EngineSettings::default(),
    );
    create_router(AppState::new(
        QaService::new(StrategyPipeline::new(retriever), Arc::new(TemplateComposer)),
        RecommendationService::new(store),
    ))
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get(uri: &str) -> (StatusCode, Value) {
    send(Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post(uri: &str, body: Value) -> (StatusCode, Value) {
    send(
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn test_health_check() {
    let (status, body) = get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_qa_answers_title_question() {
    let (status, body) = post("/api/v1/qa", json!({ "question": "Tell me about Inception" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "keyword");
    assert_eq!(body["answer_movies"][0]["tmdb_id"], 27205);
    assert!(body["answer"].as_str().unwrap().contains("Christopher Nolan"));
}

#[tokio::test]
async fn test_qa_director_question() {
    let (status, body) = post(
        "/api/v1/qa",
        json!({ "question": "What movies has Christopher Nolan directed?" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "director_search");
    assert_eq!(body["confidence"], 1.0);
    assert_eq!(body["answer_movies"][0]["title"], "Interstellar");
    assert_eq!(body["answer_movies"][1]["title"], "Inception");
}

#[tokio::test]
async fn test_qa_resolves_history() {
    let (status, body) = post(
        "/api/v1/qa",
        json!({
            "question": "Who directed it?",
            "conversation_history": [
                { "role": "user", "content": "Tell me about Inception" },
                { "role": "assistant", "content": "Inception is a heist film." }
            ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resolved_question"], "Who directed Inception?");
    assert_eq!(body["answer_movies"][0]["tmdb_id"], 27205);
}

#[tokio::test]
async fn test_qa_rejects_blank_question() {
    let (status, body) = post("/api/v1/qa", json!({ "question": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_search_endpoint() {
    let (status, body) = get("/api/v1/movies/search?q=Inception&limit=1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "keyword");
    assert_eq!(body["total"], 1);
    assert_eq!(body["results"][0]["title"], "Inception");
}

#[tokio::test]
async fn test_movie_detail_and_missing_movie() {
    let (status, body) = get("/api/v1/movies/27205").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["directors"], json!(["Christopher Nolan"]));
    assert_eq!(body["cast"][0]["character"], "Cobb");

    let (status, _) = get("/api/v1/movies/1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_top_movies_by_popularity() {
    let (status, body) = get("/api/v1/movies/top?by=popularity&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["title"], "Interstellar");
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_recommend_and_exhaust() {
    let filters = json!({ "genres": ["Horror"], "year": ["1999"] });
    let (status, body) = post("/api/v1/recommend", filters).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "The Blair Witch Project");
    assert_eq!(body["genre"], "Horror");
    assert_eq!(body["duration"], 81);
    assert_eq!(body["region"], "Unknown");

    let exhausted = json!({
        "genres": ["Horror"],
        "year": ["1999"],
        "exclude": ["The Blair Witch Project"]
    });
    let (status, body) = post("/api/v1/recommend", exhausted).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_stats_endpoint() {
    let (status, body) = get("/api/v1/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["movies"], 3);
    assert_eq!(body["people"], 2);
    assert_eq!(body["credits"], 3);
    assert_eq!(body["indexed_vectors"], 2);
}
