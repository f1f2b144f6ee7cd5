use crate::app::config::VexConfig;
use crate::app::pipeline::auction::AuctionContext;
use crate::app::pipeline::events::VideoEventContext;
use crate::app::pipeline::syncing::{SyncInContext, SyncOutContext};
use crate::core::adcache::AdCache;
use crate::core::admission::{ApiKeyValidator, IvtScorer, PublisherRateLimiter};
use crate::core::breaker::CircuitBreaker;
use crate::core::currency::CurrencyConverter;
use crate::core::geo::GeoResolver;
use crate::core::managers::{BidderManager, PublisherManager};
use crate::core::stores::KvStore;
use crate::core::usersync::SyncStore;
use crate::core::vast::EventUrlBuilder;
use crate::pipeline::Pipeline;
use crate::server::Server;
use anyhow::Error;
use std::sync::{Arc, OnceLock};

/// Write-once slots filled by the startup pipeline and drained by the
/// shutdown pipeline. Everything here is process-wide state.
#[derive(Default)]
pub struct StartupContext {
    /// Local config options, env overlay applied
    pub config: OnceLock<VexConfig>,

    // Stores and shared data providers
    /// External KV store when configured; auth and publisher tiers use it
    pub kv: OnceLock<Option<Arc<dyn KvStore>>>,
    /// IP -> country table when a geo db is configured
    pub geo: OnceLock<Option<Arc<GeoResolver>>>,
    /// API-key validation with its tiered caches
    pub auth: OnceLock<Arc<ApiKeyValidator>>,
    /// Per-publisher inbound token buckets
    pub rate_limiter: OnceLock<Arc<PublisherRateLimiter>>,
    /// Invalid-traffic scorer with compiled patterns
    pub ivt_scorer: OnceLock<Arc<IvtScorer>>,
    /// Publisher resolution chain
    pub pub_manager: OnceLock<Arc<PublisherManager>>,
    /// Registered demand adapters
    pub bidder_manager: OnceLock<Arc<BidderManager>>,
    /// Per-bidder circuit breakers
    pub breaker: OnceLock<Arc<CircuitBreaker>>,
    /// Currency rate snapshot holder
    pub currency: OnceLock<Arc<CurrencyConverter>>,
    /// UUID-keyed creative cache
    pub adcache: OnceLock<Arc<AdCache>>,
    /// User sync match table
    pub sync_store: OnceLock<Arc<dyn SyncStore>>,
    /// Tracking URL factory for VAST injection
    pub events: OnceLock<Arc<EventUrlBuilder>>,

    // Pipelines
    /// The pipeline every bid request flows through
    pub auction_pipeline: OnceLock<Arc<Pipeline<AuctionContext, Error>>>,
    /// Video playback event handling
    pub event_pipeline: OnceLock<Arc<Pipeline<VideoEventContext, Error>>>,
    /// Outbound user sync (`/cookie_sync`)
    pub sync_out_pipeline: OnceLock<Arc<Pipeline<SyncOutContext, Error>>>,
    /// Inbound user sync (`/setuid`)
    pub sync_in_pipeline: OnceLock<Arc<Pipeline<SyncInContext, Error>>>,

    /// The web server handle
    pub server: OnceLock<Server>,
}
