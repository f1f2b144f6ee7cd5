use crate::core::usersync::model::SyncEntry;
use async_trait::async_trait;
use std::collections::HashMap;

/// A user syncing backend which holds partner match-table entries
/// keyed by the local exchange uid
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Store a partner mapping, returning any previous entry
    async fn append(
        &self,
        local_id: &str,
        partner_id: &str,
        remote_id: String,
    ) -> Option<SyncEntry>;

    /// Load every partner mapping held for a local uid
    async fn load(&self, local_id: &str) -> Option<HashMap<String, SyncEntry>>;
}
