use crate::core::models::sync::SyncConfig;
use std::sync::OnceLock;

/// Context for the outbound sync flow (`/cookie_sync`): we mint or
/// reuse a local exchange uid and answer with partner sync pixels
pub struct SyncOutContext {
    /// Exchange uid already present on the caller's cookie, if any
    pub existing_uid: Option<String>,
    /// Whether the privacy gate permits storing identifiers; an
    /// invalid TCF string flips this off
    pub consent_ok: bool,
    /// Optional publisher return pixel completing the supply sync
    pub pub_sync: Option<SyncConfig>,
    pub local_uid: OnceLock<String>,
    pub html: OnceLock<String>,
}

impl SyncOutContext {
    pub fn new(existing_uid: Option<String>, consent_ok: bool, pub_sync: Option<SyncConfig>) -> Self {
        Self {
            existing_uid,
            consent_ok,
            pub_sync,
            local_uid: OnceLock::new(),
            html: OnceLock::new(),
        }
    }
}

/// Context for the inbound sync flow (`/setuid`): a partner forwards
/// its buyer uid for our match table
pub struct SyncInContext {
    pub partner_id: Option<String>,
    pub remote_uid: Option<String>,
    pub local_uid: Option<String>,
    pub consent_ok: bool,
    pub stored: OnceLock<bool>,
}

impl SyncInContext {
    pub fn new(
        partner_id: Option<String>,
        remote_uid: Option<String>,
        local_uid: Option<String>,
        consent_ok: bool,
    ) -> Self {
        Self {
            partner_id,
            remote_uid,
            local_uid,
            consent_ok,
            stored: OnceLock::new(),
        }
    }
}
