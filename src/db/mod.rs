pub mod corpus;
pub mod postgres;
pub mod redis;

pub use corpus::{CorpusStats, CorpusStore, InMemoryCorpusStore, PgCorpusStore};
pub use postgres::{create_pool, run_migrations};
pub use redis::create_redis_client;
pub use redis::Cache;
pub use redis::CacheKey;
