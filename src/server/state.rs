use crate::app::config::VexConfig;
use crate::app::pipeline::auction::AuctionContext;
use crate::app::pipeline::events::VideoEventContext;
use crate::app::pipeline::syncing::{SyncInContext, SyncOutContext};
use crate::core::adcache::AdCache;
use crate::core::admission::ApiKeyValidator;
use crate::core::vast::EventUrlBuilder;
use crate::pipeline::Pipeline;
use anyhow::Error;
use ip_network::IpNetwork;
use std::sync::Arc;
use tracing::warn;

/// Everything request handlers need, cloned into the actix data slot
pub struct AppState {
    pub config: VexConfig,
    pub auth: Arc<ApiKeyValidator>,
    pub auction_pipeline: Arc<Pipeline<AuctionContext, Error>>,
    pub event_pipeline: Arc<Pipeline<VideoEventContext, Error>>,
    pub sync_out_pipeline: Arc<Pipeline<SyncOutContext, Error>>,
    pub sync_in_pipeline: Arc<Pipeline<SyncInContext, Error>>,
    pub adcache: Arc<AdCache>,
    pub events: Arc<EventUrlBuilder>,
    /// Parsed TRUSTED_PROXIES; X-Forwarded-For honored only inside
    pub trusted_proxies: Vec<IpNetwork>,
}

impl AppState {
    pub fn parse_trusted_proxies(raw: &[String]) -> Vec<IpNetwork> {
        raw.iter()
            .filter_map(|cidr| match cidr.trim().parse::<IpNetwork>() {
                Ok(network) => Some(network),
                Err(_) => {
                    warn!("Ignoring unparseable trusted proxy CIDR {}", cidr);
                    None
                }
            })
            .collect()
    }
}
