use bytes::Bytes;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Prebid-Cache-compatible PUT body caps out at 5 MiB
pub const MAX_PUT_BODY: usize = 5 * 1024 * 1024;

/// Canonical UUID length; longer GET parameters are rejected outright
pub const UUID_PARAM_MAX: usize = 36;

fn default_ttl() -> Duration {
    Duration::from_secs(300)
}

fn default_max_entries() -> u64 {
    100_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdCacheConfig {
    #[serde(default = "default_ttl", with = "humantime_serde")]
    pub ttl: Duration,

    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for AdCacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            max_entries: default_max_entries(),
        }
    }
}

/// One PUT entry on the wire: `{"type": "xml"|"json", "value": "..."}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutEntry {
    #[serde(rename = "type")]
    pub media_type: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PutResponseEntry {
    pub uuid: String,
}

/// A stored creative payload. The cache never parses or rewrites the
/// bytes; the type tag only drives the response Content-Type.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub media_type: String,
    pub payload: Bytes,
}

impl CacheEntry {
    pub fn content_type(&self) -> &'static str {
        match self.media_type.as_str() {
            "xml" => "application/xml",
            "json" => "application/json",
            _ => "text/plain",
        }
    }
}

/// UUID-keyed opaque blob store with TTL. Fresh UUIDs make puts
/// conflict-free, so no per-key locking exists anywhere here.
pub struct AdCache {
    cache: Cache<String, Arc<CacheEntry>>,
}

impl AdCache {
    pub fn new(config: &AdCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .build();

        Self { cache }
    }

    /// Store each entry under a fresh UUID, returned in input order
    pub fn put(&self, entries: Vec<PutEntry>) -> Vec<String> {
        let mut uuids = Vec::with_capacity(entries.len());

        for entry in entries {
            let uuid = Uuid::new_v4().to_string();

            self.cache.insert(
                uuid.clone(),
                Arc::new(CacheEntry {
                    media_type: entry.media_type,
                    payload: Bytes::from(entry.value),
                }),
            );

            metrics::counter!("vex_cache_ops_total", "op" => "put").increment(1);
            uuids.push(uuid);
        }

        uuids
    }

    pub fn get(&self, uuid: &str) -> Option<Arc<CacheEntry>> {
        let hit = self.cache.get(uuid);

        metrics::counter!(
            "vex_cache_ops_total",
            "op" => if hit.is_some() { "get_hit" } else { "get_miss" }
        )
        .increment(1);

        hit
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with_ttl(ttl: Duration) -> AdCache {
        AdCache::new(&AdCacheConfig {
            ttl,
            max_entries: 1000,
        })
    }

    #[test]
    fn test_put_get_roundtrip_verbatim() {
        let cache = cache_with_ttl(Duration::from_secs(60));

        let uuids = cache.put(vec![PutEntry {
            media_type: "xml".into(),
            value: "<VAST/>".into(),
        }]);

        assert_eq!(uuids.len(), 1);

        let entry = cache.get(&uuids[0]).unwrap();
        assert_eq!(entry.payload.as_ref(), b"<VAST/>");
        assert_eq!(entry.content_type(), "application/xml");
    }

    #[test]
    fn test_put_assigns_unique_uuids() {
        let cache = cache_with_ttl(Duration::from_secs(60));

        let uuids = cache.put(vec![
            PutEntry {
                media_type: "json".into(),
                value: "{}".into(),
            },
            PutEntry {
                media_type: "json".into(),
                value: "{}".into(),
            },
        ]);

        assert_eq!(uuids.len(), 2);
        assert_ne!(uuids[0], uuids[1]);
        assert_eq!(uuids[0].len(), UUID_PARAM_MAX);
    }

    #[test]
    fn test_unknown_type_served_as_text() {
        let entry = CacheEntry {
            media_type: "csv".into(),
            payload: Bytes::from("a,b"),
        };

        assert_eq!(entry.content_type(), "text/plain");
    }

    #[test]
    fn test_missing_uuid_is_none() {
        let cache = cache_with_ttl(Duration::from_secs(60));
        assert!(cache.get("no-such-uuid").is_none());
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let cache = cache_with_ttl(Duration::from_millis(10));

        let uuids = cache.put(vec![PutEntry {
            media_type: "xml".into(),
            value: "<VAST/>".into(),
        }]);

        assert!(cache.get(&uuids[0]).is_some());
        std::thread::sleep(Duration::from_millis(25));
        assert!(cache.get(&uuids[0]).is_none());
    }
}
