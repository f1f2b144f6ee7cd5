use crate::core::openrtb::{Bid, BidRequest, BidResponse};
use crate::core::vast::model::{Creative, Linear, Vast, VastAd, VastAdKind, WrapperAd};
use crate::core::vast::trackers::inject_vast_trackers;
use crate::core::vast::tracking::EventUrlBuilder;
use anyhow::Result;
use tracing::{debug, warn};

const VAST_VERSION: &str = "4.2";
const AD_SYSTEM: &str = "vex";

/// A VAST element with no Ads; the "no ad" answer, served HTTP 200
pub fn empty_vast() -> String {
    let doc = Vast {
        version: VAST_VERSION.into(),
        ..Default::default()
    };

    doc.to_xml().unwrap_or_else(|_| {
        format!(r#"<?xml version="1.0" encoding="UTF-8"?><VAST version="{VAST_VERSION}"></VAST>"#)
    })
}

/// A VAST element carrying only an Error URI, served HTTP 200
pub fn error_vast(error_url: &str) -> String {
    let doc = Vast {
        version: VAST_VERSION.into(),
        error: Some(error_url.to_string()),
        ..Default::default()
    };

    doc.to_xml().unwrap_or_else(|_| empty_vast())
}

/// Map an auction outcome onto a playable VAST document.
///
/// For each impression with a winning video bid: markup that already
/// carries VAST gets exchange trackers injected in place; a bid with
/// only a win-notice URL becomes a Wrapper whose `VASTAdTagURI` keeps
/// the `${AUCTION_PRICE}` macro for the player to expand. Bids the
/// builder cannot express are skipped with a warning rather than
/// failing the response.
pub fn build_vast_response(
    request: &BidRequest,
    response: &BidResponse,
    events: Option<&EventUrlBuilder>,
) -> Result<String> {
    let mut video_bids: Vec<(&str, &Bid)> = Vec::new();

    for seatbid in &response.seatbid {
        for bid in &seatbid.bid {
            let is_video_imp = request
                .imp_by_id(&bid.impid)
                .map(|imp| imp.video.is_some())
                .unwrap_or(false);

            if is_video_imp {
                video_bids.push((seatbid.seat.as_str(), bid));
            }
        }
    }

    if video_bids.is_empty() {
        debug!("No winning video bids, emitting empty VAST");
        return Ok(empty_vast());
    }

    // Single inline-markup winner keeps its creative byte-exact apart
    // from tracker injection
    if video_bids.len() == 1 {
        let (seat, bid) = video_bids[0];
        if let Some(adm) = bid.adm.as_deref() {
            if adm.contains("<VAST") {
                return inject_bid_trackers(adm, &response.id, bid, seat, events);
            }
        }
    }

    let mut doc = Vast {
        version: VAST_VERSION.into(),
        ..Default::default()
    };

    for (seat, bid) in video_bids {
        match ad_for_bid(&response.id, bid, seat, events) {
            Ok(Some(ad)) => doc.ads.push(ad),
            Ok(None) => {
                warn!(
                    "Winning bid {} for imp {} has neither VAST markup nor nurl, skipping",
                    bid.id, bid.impid
                );
            }
            Err(e) => {
                warn!("Failed building VAST ad for bid {}: {}", bid.id, e);
            }
        }
    }

    if doc.is_empty() {
        return Ok(empty_vast());
    }

    doc.to_xml()
}

fn inject_bid_trackers(
    adm: &str,
    auction_id: &str,
    bid: &Bid,
    seat: &str,
    events: Option<&EventUrlBuilder>,
) -> Result<String> {
    let Some(events) = events else {
        return Ok(adm.to_string());
    };

    let trackers = events.trackers_for(auction_id, &bid.impid, seat);

    match inject_vast_trackers(adm, &trackers) {
        Ok(injected) => Ok(injected),
        Err(e) => {
            // A creative we cannot instrument still plays
            warn!("Tracker injection failed for bid {}: {}", bid.id, e);
            Ok(adm.to_string())
        }
    }
}

fn ad_for_bid(
    auction_id: &str,
    bid: &Bid,
    seat: &str,
    events: Option<&EventUrlBuilder>,
) -> Result<Option<VastAd>> {
    let trackers = events.map(|e| e.trackers_for(auction_id, &bid.impid, seat));

    if let Some(adm) = bid.adm.as_deref() {
        if adm.contains("<VAST") {
            let injected = match &trackers {
                Some(t) => inject_vast_trackers(adm, t).unwrap_or_else(|e| {
                    warn!("Tracker injection failed for bid {}: {}", bid.id, e);
                    adm.to_string()
                }),
                None => adm.to_string(),
            };

            let parsed = Vast::parse(&injected)?;
            let mut ads = parsed.ads;
            return Ok(ads.pop());
        }
    }

    let Some(nurl) = bid.nurl.as_deref() else {
        return Ok(None);
    };

    let quartiles = trackers
        .as_ref()
        .map(|t| {
            [
                ("start", &t.start),
                ("firstQuartile", &t.first_quartile),
                ("midpoint", &t.midpoint),
                ("thirdQuartile", &t.third_quartile),
                ("complete", &t.complete),
            ]
            .into_iter()
            .filter_map(|(event, url)| {
                url.as_ref().map(|u| crate::core::vast::model::TrackingEvent {
                    event: event.to_string(),
                    url: u.clone(),
                })
            })
            .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let wrapper = WrapperAd {
        ad_system: AD_SYSTEM.into(),
        // Macro left for the player; the exchange never expands it
        ad_tag_uri: nurl.to_string(),
        impressions: trackers
            .as_ref()
            .and_then(|t| t.impression.clone())
            .into_iter()
            .collect(),
        error: trackers.as_ref().and_then(|t| t.error.clone()),
        creatives: vec![Creative {
            id: bid.crid.clone().unwrap_or_default(),
            linear: Some(Linear {
                tracking_events: quartiles,
                ..Default::default()
            }),
        }],
    };

    Ok(Some(VastAd {
        id: bid.id.clone(),
        kind: VastAdKind::Wrapper(wrapper),
    }))
}
