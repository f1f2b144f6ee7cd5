use crate::core::usersync::model::SyncEntry;
use crate::core::usersync::store::SyncStore;
use async_trait::async_trait;
use moka::sync::{Cache, CacheBuilder};
use std::collections::HashMap;
use std::time::Duration;

/// In-process sync store. Production deployments point the trait at an
/// external match table; this keeps local development self-contained.
pub struct LocalSyncStore {
    /// local uid -> map<partner_id, sync_entry>
    cache: Cache<String, HashMap<String, SyncEntry>>,
}

impl LocalSyncStore {
    pub fn new(sync_ttl: Duration) -> Self {
        Self {
            cache: CacheBuilder::default().time_to_live(sync_ttl).build(),
        }
    }
}

#[async_trait]
impl SyncStore for LocalSyncStore {
    async fn append(
        &self,
        local_id: &str,
        partner_id: &str,
        remote_id: String,
    ) -> Option<SyncEntry> {
        let mut entries = self.cache.get(local_id).unwrap_or_default();

        let previous = entries.get(partner_id).cloned();
        entries.insert(partner_id.to_string(), SyncEntry::new(remote_id));

        self.cache.insert(local_id.to_string(), entries);

        previous
    }

    async fn load(&self, local_id: &str) -> Option<HashMap<String, SyncEntry>> {
        self.cache.get(local_id)
    }
}
