use crate::core::models::publisher::Publisher;
use crate::core::stores::{KvStore, PublisherDirectory};
use arc_swap::ArcSwap;
use moka::sync::Cache;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DIRECTORY_CACHE_TTL: Duration = Duration::from_secs(30);
const DIRECTORY_CACHE_MAX: u64 = 10_000;

/// Publisher identity resolution with multi-tier fallback:
/// external KV store, relational directory, a 30s in-process cache of
/// prior directory successes, and finally the static config map. The
/// first tier that answers wins.
///
/// Lock order when combined with other admission state:
/// config -> publisher cache -> rate limits. Never inverted.
pub struct PublisherManager {
    statics: ArcSwap<HashMap<String, Arc<Publisher>>>,
    cache: Cache<String, Arc<Publisher>>,
    kv: Option<Arc<dyn KvStore>>,
    directory: Option<Arc<dyn PublisherDirectory>>,
}

impl PublisherManager {
    pub fn new(
        publishers: &[Publisher],
        kv: Option<Arc<dyn KvStore>>,
        directory: Option<Arc<dyn PublisherDirectory>>,
    ) -> Self {
        let mut map = HashMap::new();
        for publisher in publishers {
            map.insert(publisher.id.clone(), Arc::new(publisher.clone()));
        }

        let cache = Cache::builder()
            .max_capacity(DIRECTORY_CACHE_MAX)
            .time_to_live(DIRECTORY_CACHE_TTL)
            .build();

        PublisherManager {
            statics: ArcSwap::from_pointee(map),
            cache,
            kv,
            directory,
        }
    }

    pub async fn resolve(&self, publisher_id: &str) -> Option<Arc<Publisher>> {
        if let Some(kv) = &self.kv {
            match kv.get(&format!("publisher:{publisher_id}")).await {
                Ok(Some(raw)) => match serde_json::from_str::<Publisher>(&raw) {
                    Ok(publisher) => {
                        debug!("Publisher {} resolved from KV store", publisher_id);
                        return Some(Arc::new(publisher));
                    }
                    Err(e) => warn!("Malformed publisher record in KV: {}", e),
                },
                Ok(None) => {}
                Err(e) => warn!("Publisher KV lookup failed: {}", e),
            }
        }

        if let Some(directory) = &self.directory {
            match directory.lookup(publisher_id).await {
                Ok(Some(publisher)) => {
                    let publisher = Arc::new(publisher);
                    self.cache
                        .insert(publisher_id.to_string(), Arc::clone(&publisher));
                    debug!("Publisher {} resolved from directory", publisher_id);
                    return Some(publisher);
                }
                Ok(None) => {}
                Err(e) => {
                    // Directory outage: prior successes keep serving
                    // from the short-TTL cache below
                    warn!("Publisher directory lookup failed: {}", e);
                }
            }
        }

        if let Some(publisher) = self.cache.get(publisher_id) {
            debug!("Publisher {} served from directory cache", publisher_id);
            return Some(publisher);
        }

        self.statics.load().get(publisher_id).cloned()
    }

    /// Replace the static map wholesale, e.g. on config reload. The
    /// swap publishes a fresh copy; in-flight readers keep iterating
    /// their own snapshot.
    pub fn reload_statics(&self, publishers: &[Publisher]) {
        let mut map = HashMap::new();
        for publisher in publishers {
            map.insert(publisher.id.clone(), Arc::new(publisher.clone()));
        }

        self.statics.store(Arc::new(map));
    }
}
