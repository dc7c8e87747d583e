use redis::aio::ConnectionManager;
use tokio::time::{timeout, Duration};

/// Connects to Redis when `REDIS_URL` is set. Returns `Ok(None)` when caching
/// is not configured.
pub async fn get_redis() -> anyhow::Result<Option<ConnectionManager>> {
    let Ok(redis_url) = std::env::var("REDIS_URL") else {
        return Ok(None);
    };
    let client = redis::Client::open(redis_url)?;

    let manager = timeout(Duration::from_secs(5), ConnectionManager::new(client))
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 5 seconds"))??;

    Ok(Some(manager))
}
