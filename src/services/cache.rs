use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};

/// Best-effort JSON cache on top of Redis. Every failure degrades to a miss.
#[derive(Clone)]
pub struct CacheService {
    redis: ConnectionManager,
}

pub fn heatmap_key(user_id: i32, team_id: Option<i32>, viewer_id: Option<i32>) -> String {
    format!(
        "heatmap:{}:{}:{}",
        user_id,
        team_id.unwrap_or(0),
        viewer_id.unwrap_or(0)
    )
}

pub fn heatmap_user_pattern(user_id: i32) -> String {
    format!("heatmap:{}:*", user_id)
}

impl CacheService {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.redis.clone();
        let raw: Option<String> = match conn.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!("Cache read for '{}' failed: {}", key, e);
                return None;
            }
        };
        raw.and_then(|s| serde_json::from_str(&s).ok())
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let Ok(json) = serde_json::to_string(value) else {
            return;
        };
        let mut conn = self.redis.clone();
        if let Err(e) = conn.set_ex::<_, _, ()>(key, json, ttl_secs).await {
            tracing::debug!("Cache write for '{}' failed: {}", key, e);
        }
    }

    pub async fn invalidate_pattern(&self, pattern: &str) {
        let mut conn = self.redis.clone();
        let keys = match redis::cmd("KEYS")
            .arg(pattern)
            .query_async::<Vec<String>>(&mut conn)
            .await
        {
            Ok(keys) => keys,
            Err(e) => {
                tracing::debug!("Cache invalidation for '{}' failed: {}", pattern, e);
                return;
            }
        };
        if !keys.is_empty() {
            let _: Result<(), _> = conn.del(keys).await;
        }
    }
}
