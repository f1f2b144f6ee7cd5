use crate::core::adapters::adapter::{BidderAdapter, MediaType};
use crate::core::adapters::generic::OpenRtbJsonAdapter;
use crate::core::models::bidder::BidderSettings;
use crate::core::openrtb::BidRequest;
use anyhow::{Error, bail};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

/// One registered demand partner: declared capabilities, the transport
/// adapter, and an optional outbound QPS limiter.
pub struct RegisteredBidder {
    pub settings: BidderSettings,
    pub adapter: Arc<dyn BidderAdapter>,
    pub limiter: Option<DefaultDirectRateLimiter>,
}

impl RegisteredBidder {
    pub fn code(&self) -> &str {
        &self.settings.code
    }

    /// Whether this bidder's declared support covers at least one
    /// impression of the request. Engines skip bidders it excludes.
    pub fn supports(&self, request: &BidRequest) -> bool {
        let channel_ok = match (&request.site, &request.app) {
            (Some(_), _) => self.settings.channels.site,
            (None, Some(_)) => self.settings.channels.app,
            (None, None) => false,
        };

        if !channel_ok {
            return false;
        }

        request.imp.iter().any(|imp| {
            (imp.banner.is_some() && self.settings.formats.banner)
                || (imp.video.is_some() && self.settings.formats.video)
                || (imp.native.is_some() && self.settings.formats.native)
                || (imp.audio.is_some() && self.settings.formats.audio)
        })
    }

    pub fn supports_media_type(&self, media_type: MediaType) -> bool {
        match media_type {
            MediaType::Banner => self.settings.formats.banner,
            MediaType::Video => self.settings.formats.video,
            MediaType::Native => self.settings.formats.native,
            MediaType::Audio => self.settings.formats.audio,
        }
    }

    /// Non-blocking QPS gate; `true` means this callout must be skipped
    pub fn throttled(&self) -> bool {
        match &self.limiter {
            Some(limiter) => limiter.check().is_err(),
            None => false,
        }
    }
}

fn create_limiter(settings: &BidderSettings) -> Option<DefaultDirectRateLimiter> {
    if settings.qps < 1 {
        debug!("Bidder {} QPS limit: none", settings.code);
        return None;
    }

    debug!("Bidder {} QPS limit: {}", settings.code, settings.qps);

    NonZeroU32::new(settings.qps).map(|qps| RateLimiter::direct(Quota::per_second(qps)))
}

/// Static bidder registry, built once at startup and immutable after.
/// Iteration order is sorted by bidder code so downstream collection
/// order, and therefore tie-breaks, are deterministic.
pub struct AdapterRegistry {
    bidders: Vec<Arc<RegisteredBidder>>,
    index: HashMap<String, Arc<RegisteredBidder>>,
}

impl AdapterRegistry {
    pub fn from_settings(settings: &[BidderSettings]) -> Result<Self, Error> {
        let mut bidders = Vec::with_capacity(settings.len());

        for entry in settings {
            if entry.code.trim().is_empty() {
                bail!("bidder registration missing code");
            }

            let adapter: Arc<dyn BidderAdapter> = match entry.adapter_kind.as_str() {
                "openrtb" => Arc::new(OpenRtbJsonAdapter::new(&entry.endpoint)),
                other => bail!("unknown adapter kind '{}' for bidder {}", other, entry.code),
            };

            bidders.push(Arc::new(RegisteredBidder {
                settings: entry.clone(),
                limiter: create_limiter(entry),
                adapter,
            }));
        }

        bidders.sort_by(|a, b| a.code().cmp(b.code()));

        let index = bidders
            .iter()
            .map(|b| (b.code().to_string(), Arc::clone(b)))
            .collect();

        Ok(Self { bidders, index })
    }

    pub fn bidders(&self) -> &[Arc<RegisteredBidder>] {
        &self.bidders
    }

    pub fn bidder(&self, code: &str) -> Option<Arc<RegisteredBidder>> {
        self.index.get(code).cloned()
    }

    pub fn len(&self) -> usize {
        self.bidders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bidders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::bidder::{TargetingChannels, TargetingFormats};
    use crate::core::openrtb::request::{Imp, Site, Video};

    fn settings(code: &str) -> BidderSettings {
        BidderSettings {
            code: code.to_string(),
            name: code.to_string(),
            endpoint: "https://dsp.example/bid".to_string(),
            ..Default::default()
        }
    }

    fn video_site_request() -> BidRequest {
        BidRequest {
            id: "r1".into(),
            site: Some(Site::default()),
            imp: vec![Imp {
                id: "imp1".into(),
                video: Some(Video::default()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_registry_sorted_by_code() {
        let registry =
            AdapterRegistry::from_settings(&[settings("zeta"), settings("alpha"), settings("mid")])
                .unwrap();

        let codes: Vec<&str> = registry.bidders().iter().map(|b| b.code()).collect();
        assert_eq!(codes, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_unknown_adapter_kind_rejected() {
        let mut bad = settings("x");
        bad.adapter_kind = "carrier-pigeon".to_string();

        assert!(AdapterRegistry::from_settings(&[bad]).is_err());
    }

    #[test]
    fn test_supports_checks_channel() {
        let mut no_site = settings("x");
        no_site.channels = TargetingChannels {
            site: false,
            app: true,
        };

        let registry = AdapterRegistry::from_settings(&[no_site]).unwrap();
        assert!(!registry.bidders()[0].supports(&video_site_request()));
    }

    #[test]
    fn test_supports_checks_formats() {
        let mut banner_only = settings("x");
        banner_only.formats = TargetingFormats {
            banner: true,
            video: false,
            native: false,
            audio: false,
        };

        let registry = AdapterRegistry::from_settings(&[banner_only]).unwrap();
        assert!(!registry.bidders()[0].supports(&video_site_request()));
    }

    #[test]
    fn test_qps_zero_means_unlimited() {
        let registry = AdapterRegistry::from_settings(&[settings("x")]).unwrap();
        let bidder = &registry.bidders()[0];

        assert!(bidder.limiter.is_none());
        assert!(!bidder.throttled());
    }

    #[test]
    fn test_qps_limiter_throttles() {
        let mut limited = settings("x");
        limited.qps = 1;

        let registry = AdapterRegistry::from_settings(&[limited]).unwrap();
        let bidder = &registry.bidders()[0];

        assert!(!bidder.throttled());
        // Quota of 1/s exhausted by the first check
        assert!(bidder.throttled());
    }
}
