use std::{path::Path, sync::Arc};

use axum::middleware::from_fn;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use peninemate_api::{
    config::Config,
    db::{create_pool, create_redis_client, run_migrations, Cache, CorpusStore, PgCorpusStore},
    middleware::{make_span_with_request_id, request_id_middleware},
    routes::{create_router, AppState},
    services::{
        strategies::Retriever, HttpEmbedder, QaService, RecommendationService, SemanticIndex,
        StrategyPipeline, TemplateComposer, TmdbProvider,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("peninemate_api=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let settings = config.engine_settings();

    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;
    let store: Arc<dyn CorpusStore> = Arc::new(PgCorpusStore::new(pool));

    let (cache, cache_writer) = match &config.redis_url {
        Some(url) => {
            let (cache, handle) = Cache::new(create_redis_client(url)?).await;
            (cache, Some(handle))
        }
        None => {
            tracing::info!("REDIS_URL not set, response cache disabled");
            (Cache::disabled(), None)
        }
    };

    let embedder = Arc::new(HttpEmbedder::new(
        cache.clone(),
        config.embedding_url.clone(),
        config.embedding_model.clone(),
        config.upstream_timeout(),
    )?);
    let provider = Arc::new(TmdbProvider::new(
        cache,
        config.tmdb_api_key.clone(),
        config.tmdb_api_url.clone(),
        config.upstream_timeout(),
    )?);

    let index = Arc::new(SemanticIndex::new());
    let snapshot = config.index_snapshot_path.clone();
    if let Some(path) = snapshot.as_deref().map(Path::new).filter(|p| p.exists()) {
        match index.load_snapshot(path) {
            Ok(count) => tracing::info!(vectors = count, "Loaded index snapshot"),
            Err(e) => tracing::warn!(error = %e, "Ignoring unreadable index snapshot"),
        }
    }

    // Requests are served from the snapshot (or keyword/person search alone)
    // while the rest of the corpus is embedded.
    let index_build = {
        let (index, store, embedder) = (index.clone(), store.clone(), embedder.clone());
        tokio::spawn(async move {
            match index.build_from_store(store.as_ref(), embedder.as_ref()).await {
                Ok(added) if added > 0 => {
                    if let Some(path) = snapshot.as_deref().map(Path::new) {
                        if let Err(e) = index.save_snapshot(path) {
                            tracing::warn!(error = %e, "Failed to save index snapshot");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Semantic index build failed"),
            }
        })
    };

    let retriever = Retriever::new(store.clone(), index, embedder, provider, settings);
    let state = AppState::new(
        QaService::new(StrategyPipeline::new(retriever), Arc::new(TemplateComposer)),
        RecommendationService::new(store),
    );

    let app = create_router(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(from_fn(request_id_middleware))
        .layer(CorsLayer::permissive());

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    index_build.abort();
    if let Some(handle) = cache_writer {
        handle.shutdown().await;
    }
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
