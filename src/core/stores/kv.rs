use anyhow::{Context, Error};
use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use std::time::{Duration, Instant};
use tracing::debug;

/// An external key/value backend treated as an opaque store. Used by
/// API-key auth and publisher resolution as their first lookup tier.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), Error>;
}

/// Redis/Valkey backed store using a multiplexed connection manager
pub struct RedisStore {
    manager: redis::aio::ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let client = redis::Client::open(url).context("invalid redis url")?;
        let manager = client
            .get_connection_manager()
            .await
            .context("redis connect failed")?;

        debug!("Connected to redis at {}", url);

        Ok(Self { manager })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key).await.context("redis get failed")?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), Error> {
        let mut conn = self.manager.clone();

        match ttl {
            Some(ttl) => {
                let _: () = conn
                    .set_ex(key, value, ttl.as_secs().max(1))
                    .await
                    .context("redis setex failed")?;
            }
            None => {
                let _: () = conn.set(key, value).await.context("redis set failed")?;
            }
        }

        Ok(())
    }
}

/// In-process store for local development and tests
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, (String, Option<Instant>)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        if let Some(entry) = self.entries.get(key) {
            let (value, expiry) = entry.value();
            if expiry.map(|at| Instant::now() < at).unwrap_or(true) {
                return Ok(Some(value.clone()));
            }
        }

        // Expired entries are dropped lazily
        self.entries
            .remove_if(key, |_, (_, expiry)| {
                expiry.map(|at| Instant::now() >= at).unwrap_or(false)
            });

        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), Error> {
        let expiry = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .insert(key.to_string(), (value.to_string(), expiry));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_rt::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();

        store.set("k1", "v1", None).await.unwrap();
        assert_eq!(store.get("k1").await.unwrap().as_deref(), Some("v1"));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[actix_rt::test]
    async fn test_memory_store_ttl_expiry() {
        let store = MemoryStore::new();

        store
            .set("k1", "v1", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        assert!(store.get("k1").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(store.get("k1").await.unwrap().is_none());
    }
}
