/// A macro to simplify caching logic using Redis.
///
/// This macro checks if a value is present in the cache.
/// If found, it returns the cached value.
/// If not found, or the cache cannot be read, it executes the provided block
/// to compute the value, stores it in the cache, and then returns it.
///
/// # Arguments
/// * `$cache`: The cache instance to use for retrieval and storage. The cache must have
///   `get_from_cache` and `set_in_background` methods.
/// * `$key`: The key to use for caching the value.
/// * `$ttl`: The time-to-live (TTL) for the cached value in seconds.
/// * `$block`: The future to await if the value is not found in cache.
///
/// # Example
/// ```rust,ignore
/// let details = cached!(self.cache, CacheKey::TmdbMovie(id), 3600, async move {
///     fetch_details(id).await
/// });
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let cached = match $cache.get_from_cache(&$key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, key = %$key, "Cache read failed, treating as miss");
                None
            }
        };

        if let Some(cached) = cached {
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.set_in_background(&$key, &value, $ttl);
            Ok(value)
        }
    }};
}
