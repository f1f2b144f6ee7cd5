use crate::core::adcache::AdCacheConfig;
use crate::core::admission::{AuthConfig, IvtConfig, RateLimitConfig, SizeLimits};
use crate::core::breaker::BreakerConfig;
use crate::core::currency::CurrencyConfig;
use crate::core::models::bidder::BidderSettings;
use crate::core::models::publisher::Publisher;
use config::Config;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_http_port() -> u16 {
    8000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub http_port: u16,
    pub workers: Option<usize>,
    pub backlog: Option<u32>,
    pub max_conns: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            workers: None,
            backlog: None,
            max_conns: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherSettings {
    /// Publisher resolution gate; secure by default
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Accept publishers absent from every resolution tier
    pub allow_unregistered: bool,
    /// Enforce the per-publisher allowed-domain patterns
    pub validate_domain: bool,
    pub registered: Vec<Publisher>,
    pub rate_limit: RateLimitConfig,
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_unregistered: false,
            validate_domain: false,
            registered: Vec::new(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

fn default_tmax() -> u64 {
    500
}

fn default_min_tmax() -> u64 {
    50
}

fn default_max_tmax() -> u64 {
    2000
}

fn default_bidder_timeout() -> u64 {
    1000
}

fn default_price_ceiling() -> f64 {
    1_000_000.0
}

fn default_max_demand_body() -> usize {
    1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuctionSettings {
    /// Applied when the request carries no tmax
    #[serde(default = "default_tmax")]
    pub default_tmax_ms: u64,

    #[serde(default = "default_min_tmax")]
    pub min_tmax_ms: u64,

    #[serde(default = "default_max_tmax")]
    pub max_tmax_ms: u64,

    /// Per-bidder sub-deadline cap
    #[serde(default = "default_bidder_timeout")]
    pub max_bidder_timeout_ms: u64,

    /// Reasonableness ceiling on bid prices
    #[serde(default = "default_price_ceiling")]
    pub price_ceiling: f64,

    /// Added to the runner-up price in second-price clearing
    pub second_price_increment: f64,

    /// Clear a lone above-floor bid at its ask instead of the floor
    pub single_bid_first_price: bool,

    /// Strict mode: win-notice URLs must be https
    pub strict_nurl_https: bool,

    /// Keep losing bids in the response for debugging
    pub debug: bool,

    /// Cap on a single bidder response body
    #[serde(default = "default_max_demand_body")]
    pub max_demand_body: usize,
}

impl Default for AuctionSettings {
    fn default() -> Self {
        Self {
            default_tmax_ms: default_tmax(),
            min_tmax_ms: default_min_tmax(),
            max_tmax_ms: default_max_tmax(),
            max_bidder_timeout_ms: default_bidder_timeout(),
            price_ceiling: default_price_ceiling(),
            second_price_increment: 0.0,
            single_bid_first_price: false,
            strict_nurl_https: false,
            debug: false,
            max_demand_body: default_max_demand_body(),
        }
    }
}

impl AuctionSettings {
    /// Request deadline: `clamp(tmax, min, max)`, default when absent
    /// or zero
    pub fn clamp_tmax(&self, tmax: Option<u64>) -> Duration {
        let requested = match tmax {
            Some(0) | None => self.default_tmax_ms,
            Some(value) => value,
        };

        Duration::from_millis(requested.clamp(self.min_tmax_ms, self.max_tmax_ms))
    }
}

fn default_events_base() -> String {
    "http://127.0.0.1:8000/api/v1/video/event".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    /// Base URL all injected tracking URIs derive from
    #[serde(default = "default_events_base")]
    pub events_base_url: String,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            events_base_url: default_events_base(),
        }
    }
}

fn default_kv_url() -> String {
    "redis://127.0.0.1:6379/".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KvSettings {
    pub enabled: bool,
    #[serde(default = "default_kv_url")]
    pub url: String,
    /// Treat an unreachable store at boot as fatal
    pub required: bool,
}

impl Default for KvSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_kv_url(),
            required: false,
        }
    }
}

fn default_sync_ttl() -> Duration {
    Duration::from_secs(60 * 60 * 24 * 7)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    #[serde(default = "default_sync_ttl", with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            ttl: default_sync_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRotation {
    Daily,
    Hourly,
    Never,
}

impl Default for FileRotation {
    fn default() -> Self {
        FileRotation::Daily
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSink {
    /// Whether spans should be exported to this sink
    pub spans: bool,
    /// The kind of logging sink
    pub dest: LogType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogType {
    Stdout {
        #[serde(default = "default_logtype_color")]
        color: bool,
        #[serde(default)]
        json: bool,
    },
    File {
        path: PathBuf,
        #[serde(default)]
        json: bool,
        #[serde(default)]
        rotation: FileRotation,
        #[serde(default)]
        max_files: usize,
    },
}

fn default_logtype_color() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub span_sample_rate: f32,
    #[serde(default)]
    pub sinks: Vec<LogSink>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            span_sample_rate: 0.01,
            sinks: vec![LogSink {
                spans: true,
                dest: LogType::Stdout {
                    color: true,
                    json: false,
                },
            }],
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.sinks.is_empty() {
            anyhow::bail!("At least one logging sink must be configured");
        }

        self.level.parse::<tracing::Level>().map_err(|_| {
            anyhow::anyhow!(
                "Invalid log level: '{}'. Valid levels: trace, debug, info, warn, error",
                self.level
            )
        })?;

        if !(0.0..=1.0).contains(&self.span_sample_rate) {
            anyhow::bail!(
                "span_sample_rate must be between 0.0 and 1.0, got {}",
                self.span_sample_rate
            );
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, Builder)]
#[serde(default)]
#[builder(default)]
pub struct VexConfig {
    pub server: ServerSettings,
    pub auth: AuthConfig,
    pub publishers: PublisherSettings,
    pub ivt: IvtConfig,
    pub limits: SizeLimits,
    pub auction: AuctionSettings,
    pub currency: CurrencyConfig,
    pub cache: AdCacheConfig,
    pub breaker: BreakerConfig,
    pub tracking: TrackingSettings,
    pub bidders: Vec<BidderSettings>,
    pub kv: KvSettings,
    pub sync: SyncSettings,
    /// CSV CIDR->country table consumed by the geo check
    pub geoip_path: Option<PathBuf>,
    /// X-Forwarded-For is honored only from these CIDRs
    pub trusted_proxies: Vec<String>,
    pub logging: LoggingConfig,
}

impl VexConfig {
    pub fn load(path: &PathBuf) -> Result<VexConfig, anyhow::Error> {
        let cfg = Config::builder()
            .add_source(config::File::from(path.to_path_buf()))
            .build()?;

        let mut parsed: VexConfig = cfg.try_deserialize()?;
        parsed.apply_env(|name| std::env::var(name).ok());

        Ok(parsed)
    }

    /// Environment overlay. Applied after file load so operations can
    /// flip the documented switches without editing config.
    pub fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(flag) = get("AUTH_ENABLED").and_then(parse_bool) {
            self.auth.enabled = flag;
        }
        if let Some(flag) = get("AUTH_USE_REDIS").and_then(parse_bool) {
            self.auth.use_kv = flag;
            if flag {
                self.kv.enabled = true;
            }
        }
        if let Some(raw) = get("API_KEYS") {
            for pair in raw.split(',') {
                if let Some((key, publisher)) = pair.split_once(':') {
                    self.auth
                        .keys
                        .insert(key.trim().to_string(), publisher.trim().to_string());
                }
            }
        }

        if let Some(flag) = get("PUBLISHER_AUTH_ENABLED").and_then(parse_bool) {
            self.publishers.enabled = flag;
        }
        if let Some(flag) = get("PUBLISHER_ALLOW_UNREGISTERED").and_then(parse_bool) {
            self.publishers.allow_unregistered = flag;
        }
        if let Some(flag) = get("PUBLISHER_VALIDATE_DOMAIN").and_then(parse_bool) {
            self.publishers.validate_domain = flag;
        }
        if let Some(raw) = get("REGISTERED_PUBLISHERS") {
            for id in raw.split(',').map(str::trim).filter(|id| !id.is_empty()) {
                if !self.publishers.registered.iter().any(|p| p.id == id) {
                    self.publishers.registered.push(Publisher::unregistered(id));
                }
            }
        }

        if let Some(flag) = get("IVT_MONITORING_ENABLED").and_then(parse_bool) {
            self.ivt.monitoring_enabled = flag;
        }
        if let Some(flag) = get("IVT_BLOCKING_ENABLED").and_then(parse_bool) {
            self.ivt.blocking_enabled = flag;
        }
        if let Some(flag) = get("IVT_CHECK_UA").and_then(parse_bool) {
            self.ivt.check_ua = flag;
        }
        if let Some(flag) = get("IVT_CHECK_REFERER").and_then(parse_bool) {
            self.ivt.check_referer = flag;
        }
        if let Some(flag) = get("IVT_CHECK_GEO").and_then(parse_bool) {
            self.ivt.check_geo = flag;
        }
        if let Some(flag) = get("IVT_CHECK_RATELIMIT").and_then(parse_bool) {
            self.publishers.rate_limit.enabled = flag;
        }
        if let Some(flag) = get("IVT_REQUIRE_REFERER").and_then(parse_bool) {
            self.ivt.require_referer = flag;
        }
        if let Some(raw) = get("IVT_ALLOWED_COUNTRIES") {
            self.ivt.allowed_countries = parse_csv(&raw);
        }
        if let Some(raw) = get("IVT_BLOCKED_COUNTRIES") {
            self.ivt.blocked_countries = parse_csv(&raw);
        }
        if let Some(path) = get("GEOIP_DB_PATH") {
            self.geoip_path = Some(PathBuf::from(path));
        }

        if let Some(rps) = get("RATE_LIMIT_RPS").and_then(|v| v.parse().ok()) {
            self.publishers.rate_limit.rps = rps;
        }
        if let Some(burst) = get("RATE_LIMIT_BURST").and_then(|v| v.parse().ok()) {
            self.publishers.rate_limit.burst = burst;
        }
        if let Some(size) = get("MAX_REQUEST_SIZE").and_then(|v| v.parse().ok()) {
            self.limits.max_request_size = size;
        }
        if let Some(length) = get("MAX_URL_LENGTH").and_then(|v| v.parse().ok()) {
            self.limits.max_url_length = length;
        }
        if let Some(raw) = get("TRUSTED_PROXIES") {
            self.trusted_proxies = parse_csv(&raw);
        }
    }
}

fn parse_bool(raw: String) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(String::from)
        .collect()
}
