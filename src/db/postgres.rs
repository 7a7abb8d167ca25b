use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::error::AppResult;

/// Connections shared by concurrent questions and recommendations
const MAX_CONNECTIONS: u32 = 10;

/// Creates the corpus connection pool. Failing to connect at start-up is fatal.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    tracing::info!(max_connections = MAX_CONNECTIONS, "Connected to corpus database");
    Ok(pool)
}

/// Applies the embedded schema migrations under `migrations/`
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}
