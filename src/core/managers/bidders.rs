use crate::core::adapters::{AdapterRegistry, RegisteredBidder};
use crate::core::openrtb::BidRequest;
use std::sync::Arc;

/// Thin view over the adapter registry used by the auction pipeline.
/// The registry is immutable after startup, so no locking is needed.
pub struct BidderManager {
    registry: AdapterRegistry,
}

impl BidderManager {
    pub fn new(registry: AdapterRegistry) -> Self {
        BidderManager { registry }
    }

    /// Enabled bidders whose declared support covers the request, in
    /// registry (sorted-code) order
    pub fn matching(&self, request: &BidRequest) -> Vec<Arc<RegisteredBidder>> {
        self.registry
            .bidders()
            .iter()
            .filter(|bidder| bidder.settings.enabled && bidder.supports(request))
            .cloned()
            .collect()
    }

    pub fn bidder(&self, code: &str) -> Option<Arc<RegisteredBidder>> {
        self.registry.bidder(code)
    }

    pub fn all(&self) -> &[Arc<RegisteredBidder>] {
        self.registry.bidders()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::bidder::BidderSettings;
    use crate::core::openrtb::request::{Imp, Site, Video};

    fn manager(settings: Vec<BidderSettings>) -> BidderManager {
        BidderManager::new(AdapterRegistry::from_settings(&settings).unwrap())
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
    fn test_disabled_bidders_excluded() {
        let mut disabled = BidderSettings {
            code: "off".into(),
            endpoint: "https://a.example/bid".into(),
            ..Default::default()
        };
        disabled.enabled = false;

        let enabled = BidderSettings {
            code: "on".into(),
            endpoint: "https://b.example/bid".into(),
            ..Default::default()
        };

        let manager = manager(vec![disabled, enabled]);
        let matched = manager.matching(&video_site_request());

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].code(), "on");
    }

    #[test]
    fn test_matching_order_is_sorted_by_code() {
        let settings = ["zeta", "alpha", "mid"]
            .into_iter()
            .map(|code| BidderSettings {
                code: code.into(),
                endpoint: "https://a.example/bid".into(),
                ..Default::default()
            })
            .collect();

        let manager = manager(settings);
        let matched = manager.matching(&video_site_request());
        let codes: Vec<&str> = matched.iter().map(|b| b.code()).collect();

        assert_eq!(codes, vec!["alpha", "mid", "zeta"]);
    }
}
