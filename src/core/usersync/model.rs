use serde::{Deserialize, Serialize};

/// A stored user sync result for one partner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncEntry {
    /// Millis timestamp of the last update to this record
    pub ts: u64,
    /// The partner-side id, e.g. a DSP buyeruid
    pub rid: String,
}

impl SyncEntry {
    pub fn new(remote_id: String) -> SyncEntry {
        Self {
            ts: chrono::Utc::now().timestamp_millis() as u64,
            rid: remote_id,
        }
    }
}
