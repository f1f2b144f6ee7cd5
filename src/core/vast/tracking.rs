use crate::core::vast::trackers::{VastTrackers, VastTrackersBuilder};
use anyhow::{Context, Result};
use url::Url;

/// VAST error-code macro, substituted by the player
pub const ERRORCODE_MACRO: &str = "[ERRORCODE]";

/// Builds exchange event-tracking URLs from the configured base.
///
/// URLs are always assembled through [`Url`] query APIs so identifiers
/// are percent-encoded and can never splice into the URL structure.
/// Macro placeholders (`[ERRORCODE]`) are appended after encoding so
/// they reach the player verbatim.
#[derive(Debug, Clone)]
pub struct EventUrlBuilder {
    base: Url,
}

impl EventUrlBuilder {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url).context("invalid tracking base URL")?;
        Ok(Self { base })
    }

    pub fn event_url(&self, event: &str, auction_id: &str, imp_id: &str, bidder: &str) -> String {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("event", event)
            .append_pair("auction", auction_id)
            .append_pair("imp", imp_id)
            .append_pair("bidder", bidder);

        url.to_string()
    }

    /// Error URL keeps the `[ERRORCODE]` macro intact for the player
    pub fn error_url(&self, auction_id: &str, imp_id: &str, bidder: &str) -> String {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("event", "error")
            .append_pair("auction", auction_id)
            .append_pair("imp", imp_id)
            .append_pair("bidder", bidder);

        let query = url.query().unwrap_or_default().to_string();
        url.set_query(Some(&format!("{query}&code={ERRORCODE_MACRO}")));

        url.to_string()
    }

    /// Full tracker set for one winning video bid
    pub fn trackers_for(&self, auction_id: &str, imp_id: &str, bidder: &str) -> VastTrackers {
        VastTrackersBuilder::default()
            .impression(Some(self.event_url("impression", auction_id, imp_id, bidder)))
            .error(Some(self.error_url(auction_id, imp_id, bidder)))
            .start(Some(self.event_url("start", auction_id, imp_id, bidder)))
            .first_quartile(Some(self.event_url("firstQuartile", auction_id, imp_id, bidder)))
            .midpoint(Some(self.event_url("midpoint", auction_id, imp_id, bidder)))
            .third_quartile(Some(self.event_url("thirdQuartile", auction_id, imp_id, bidder)))
            .complete(Some(self.event_url("complete", auction_id, imp_id, bidder)))
            .pause(Some(self.event_url("pause", auction_id, imp_id, bidder)))
            .resume(Some(self.event_url("resume", auction_id, imp_id, bidder)))
            .skip(Some(self.event_url("skip", auction_id, imp_id, bidder)))
            .click_tracking(Some(self.event_url("click", auction_id, imp_id, bidder)))
            .build()
            .expect("all tracker fields defaulted")
    }
}
