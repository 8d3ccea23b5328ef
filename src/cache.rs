//! Short-lived key/value storage for session data.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::ApiError;

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

impl From<CacheError> for ApiError {
    fn from(e: CacheError) -> Self {
        tracing::error!(error = %e, "session cache failure");
        ApiError::Internal
    }
}

#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    /// Drop every entry. Used by tests and maintenance tooling.
    async fn flush(&self) -> Result<(), CacheError>;
}

/// Process-local cache; expired entries are dropped lazily on read.
#[derive(Default)]
pub struct InMemoryCache {
    entries: DashMap<String, (String, Instant)>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let hit = self.entries.get(key).and_then(|e| (e.1 > now).then(|| e.0.clone()));
        if hit.is_none() {
            self.entries.remove_if(key, |_, (_, expires_at)| *expires_at <= now);
        }
        Ok(hit)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn flush(&self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }
}

#[cfg(feature = "redis-cache")]
pub mod redis {
    use super::*;
    use deadpool_redis::redis::AsyncCommands;
    use deadpool_redis::{Config, Pool, Runtime};

    #[derive(Clone)]
    pub struct RedisCache {
        pool: Pool,
    }

    fn unavailable(e: impl std::fmt::Display) -> CacheError {
        CacheError::Unavailable(e.to_string())
    }

    impl RedisCache {
        pub fn from_url(url: &str) -> Result<Self, CacheError> {
            let pool = Config::from_url(url).create_pool(Some(Runtime::Tokio1)).map_err(unavailable)?;
            Ok(Self { pool })
        }

        async fn conn(&self) -> Result<deadpool_redis::Connection, CacheError> {
            self.pool.get().await.map_err(unavailable)
        }
    }

    #[async_trait]
    impl SessionCache for RedisCache {
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            let mut conn = self.conn().await?;
            let value: Option<String> = conn.get(key).await.map_err(unavailable)?;
            Ok(value)
        }

        async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
            let mut conn = self.conn().await?;
            let (): () = conn.set_ex(key, value, ttl.as_secs().max(1)).await.map_err(unavailable)?;
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), CacheError> {
            let mut conn = self.conn().await?;
            let (): () = conn.del(key).await.map_err(unavailable)?;
            Ok(())
        }

        async fn flush(&self) -> Result<(), CacheError> {
            let mut conn = self.conn().await?;
            let (): () = deadpool_redis::redis::cmd("FLUSHDB").query_async(&mut conn).await.map_err(unavailable)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete() {
        let cache = InMemoryCache::new();
        cache.set("refresh:1", "abc".into(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("refresh:1").await.unwrap().as_deref(), Some("abc"));
        cache.delete("refresh:1").await.unwrap();
        assert!(cache.get("refresh:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_invisible() {
        let cache = InMemoryCache::new();
        cache.set("k", "v".into(), Duration::ZERO).await.unwrap();
        assert!(cache.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn flush_clears_everything() {
        let cache = InMemoryCache::new();
        cache.set("a", "1".into(), Duration::from_secs(60)).await.unwrap();
        cache.set("b", "2".into(), Duration::from_secs(60)).await.unwrap();
        cache.flush().await.unwrap();
        assert!(cache.get("a").await.unwrap().is_none());
        assert!(cache.get("b").await.unwrap().is_none());
    }
}
