use crate::core::models::bidder::BidderSettings;
use crate::core::models::sync::{SyncConfig, SyncKind};
use crate::core::usersync::constants;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Check whether a buyer id carries our expected platform prefix
pub fn validate_local_id(local_id: &str) -> bool {
    local_id.trim().starts_with(constants::VEX_USER_ID_PREFIX)
}

/// Generate a prefixed local exchange user id
pub fn generate_local_id() -> String {
    format!("{}{}", constants::VEX_USER_ID_PREFIX, Uuid::new_v4())
}

/// Build one partner pixel (image or iframe), substituting our local
/// exchange id into the partner's macro location if present
pub fn build_kind_pixel(sync: &SyncConfig, local_uid: &str, local_uid_macro: &str) -> String {
    let safe_url = sync
        .url
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace(local_uid_macro, local_uid);

    match sync.kind {
        SyncKind::Image => {
            format!(
                "<img height=\"1\" width=\"1\" style='display: none;' src=\"{}\" />",
                safe_url
            )
        }
        SyncKind::Iframe => {
            format!(
                "<iframe height=\"1\" width=\"1\" style='display: none;' src=\"{}\"></iframe>",
                safe_url
            )
        }
    }
}

/// Builds the iframe html of sync pixels for the provided bidders,
/// optionally prefixed by a publisher return pixel to complete the
/// supply-side sync
pub fn generate_sync_iframe_html(
    local_uid: &str,
    bidders: &[Arc<crate::core::adapters::RegisteredBidder>],
    pub_sync: Option<SyncConfig>,
) -> String {
    let mut pixels = Vec::with_capacity(bidders.len() + 1);
    let local_uid_macro = constants::VEX_LOCAL_ID_MACRO;

    if let Some(sync) = pub_sync {
        if !sync.url.trim().is_empty() {
            pixels.push(build_kind_pixel(&sync, local_uid, local_uid_macro));
            debug!("Appended publisher sync pixel to iframe content");
        }
    }

    for bidder in bidders {
        let settings: &BidderSettings = &bidder.settings;

        let Some(bidder_sync) = &settings.usersync else {
            continue;
        };

        if bidder_sync.url.trim().is_empty() {
            warn!(
                "Syncing configured for bidder {} but pixel url empty!",
                settings.code
            );
            continue;
        }

        pixels.push(build_kind_pixel(bidder_sync, local_uid, local_uid_macro));
        debug!("Appended sync pixel to iframe content for {}", settings.code);
    }

    pixels.join("\n")
}
