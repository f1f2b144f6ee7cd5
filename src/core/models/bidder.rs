use crate::core::models::sync::SyncConfig;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
pub struct TargetingFormats {
    pub banner: bool,
    pub video: bool,
    pub native: bool,
    pub audio: bool,
}

impl Default for TargetingFormats {
    fn default() -> Self {
        Self {
            banner: true,
            video: true,
            native: true,
            audio: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
pub struct TargetingChannels {
    /// Site requests are enabled
    pub site: bool,
    /// App requests are enabled
    pub app: bool,
}

impl Default for TargetingChannels {
    fn default() -> Self {
        Self {
            site: true,
            app: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Registration record for one demand partner. The transport-specific
/// adapter implementation is resolved by `adapter_kind`.
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[serde(default)]
pub struct BidderSettings {
    /// Stable bidder code used as the seat id
    pub code: String,
    pub name: String,
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Outbound bid endpoint URL
    pub endpoint: String,
    /// Max outbound QPS for this bidder; 0 means unlimited
    pub qps: u32,
    /// Adapter implementation; only "openrtb" ships in-tree
    pub adapter_kind: String,
    pub formats: TargetingFormats,
    pub channels: TargetingChannels,
    pub usersync: Option<SyncConfig>,
}

impl Default for BidderSettings {
    fn default() -> Self {
        Self {
            code: String::new(),
            name: String::new(),
            enabled: true,
            endpoint: String::new(),
            qps: 0,
            adapter_kind: "openrtb".to_string(),
            formats: TargetingFormats::default(),
            channels: TargetingChannels::default(),
            usersync: None,
        }
    }
}
