use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Serialize, Deserialize, Default, EnumString, Display)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    #[default]
    Image,
    Iframe,
}

/// Partner user-sync pixel configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
pub struct SyncConfig {
    pub url: String,
    pub kind: SyncKind,
}
