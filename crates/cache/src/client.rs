//! Redis implementation of [`CacheBackend`].

use crate::backend::{ttl_secs, CacheBackend};
use async_trait::async_trait;
use matchmaker_core::config::RedisConfig;
use matchmaker_core::{MatchError, MatchResult};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::info;

/// Redis-backed cache store sharing one auto-reconnecting connection.
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    /// Connect to the first configured Redis node and verify it answers.
    pub async fn new(config: &RedisConfig) -> anyhow::Result<Self> {
        let url = config
            .urls
            .first()
            .cloned()
            .unwrap_or_else(|| "redis://localhost:6379".to_string());

        info!(url = %url, "Connecting to Redis");

        let client = redis::Client::open(url.as_str())?;
        let conn = tokio::time::timeout(
            Duration::from_millis(config.connect_timeout_ms),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("timed out connecting to Redis at {url}"))??;

        let backend = Self { conn };
        backend.ping().await?;
        info!("Redis connection established");

        Ok(backend)
    }
}

fn cache_err(e: redis::RedisError) -> MatchError {
    metrics::counter!("cache.backend.errors").increment(1);
    MatchError::Cache(e.to_string())
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> MatchResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(cache_err)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> MatchResult<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl))
            .await
            .map_err(cache_err)
    }

    async fn delete(&self, key: &str) -> MatchResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(cache_err)
    }

    async fn set_add(&self, key: &str, member: &str, ttl: Duration) -> MatchResult<()> {
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .sadd(key, member)
            .ignore()
            .expire(key, ttl_secs(ttl) as i64)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(cache_err)
    }

    async fn set_contains(&self, key: &str, member: &str) -> MatchResult<bool> {
        let mut conn = self.conn.clone();
        conn.sismember(key, member).await.map_err(cache_err)
    }

    async fn set_members(&self, key: &str) -> MatchResult<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.smembers(key).await.map_err(cache_err)
    }

    async fn list_replace(&self, key: &str, items: &[String], ttl: Duration) -> MatchResult<()> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !items.is_empty() {
            pipe.rpush(key, items)
                .ignore()
                .expire(key, ttl_secs(ttl) as i64)
                .ignore();
        }
        pipe.query_async::<_, ()>(&mut conn).await.map_err(cache_err)
    }

    async fn list_range(&self, key: &str) -> MatchResult<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.lrange(key, 0, -1).await.map_err(cache_err)
    }

    async fn ping(&self) -> MatchResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(cache_err)?;
        Ok(())
    }
}
