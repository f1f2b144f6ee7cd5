use crate::app::config::AuctionSettings;
use crate::app::pipeline::auction::context::BidValidationError;
use crate::core::adapters::{BidderResponse, MediaType, TypedBid};
use crate::core::currency::CurrencyRates;
use crate::core::observability::counters;
use crate::core::openrtb::validation::{adomain_blocked, banner_allows};
use crate::core::openrtb::{BidRequest, Imp};
use std::collections::HashSet;
use url::Url;

/// Validate one bidder's parsed response against the request and
/// normalise accepted prices to the response currency.
///
/// Response-level failures (id not echoing the request, currency not
/// allowed) reject every bid. Per-bid failures drop only that bid;
/// the structured rejection list is returned alongside so callers can
/// log and count them. Nothing here ever fails the auction.
pub fn validate_bidder_response(
    request: &BidRequest,
    bidder_code: &str,
    response: &BidderResponse,
    settings: &AuctionSettings,
    rates: &CurrencyRates,
    response_currency: &str,
) -> (Vec<TypedBid>, Vec<BidValidationError>) {
    let mut accepted = Vec::with_capacity(response.bids.len());
    let mut rejections = Vec::new();

    let bid_currency = if response.currency.trim().is_empty() {
        "USD"
    } else {
        response.currency.as_str()
    };

    let currency_allowed = request.cur.is_empty()
        || request
            .cur
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(bid_currency));

    let mut reject = |bid_id: &str, imp_id: &str, reason: &'static str| {
        counters::record_bid_rejected(bidder_code, reason);
        rejections.push(BidValidationError {
            bidder_code: bidder_code.to_string(),
            bid_id: bid_id.to_string(),
            imp_id: imp_id.to_string(),
            reason,
        });
    };

    // The response id must be present and echo the request id; a
    // mismatch rejects everything the bidder sent
    if response.id.trim().is_empty() || response.id != request.id {
        for typed in &response.bids {
            reject(&typed.bid.id, &typed.bid.impid, "response_id_mismatch");
        }
        return (accepted, rejections);
    }

    if !currency_allowed {
        for typed in &response.bids {
            reject(&typed.bid.id, &typed.bid.impid, "currency_not_allowed");
        }
        return (accepted, rejections);
    }

    let mut seen_bid_ids: HashSet<&str> = HashSet::with_capacity(response.bids.len());

    for typed in &response.bids {
        let bid = &typed.bid;

        if bid.id.trim().is_empty() {
            reject(&bid.id, &bid.impid, "missing_bid_id");
            continue;
        }

        if !seen_bid_ids.insert(bid.id.as_str()) {
            reject(&bid.id, &bid.impid, "duplicate_bid_id");
            continue;
        }

        if bid.impid.trim().is_empty() {
            reject(&bid.id, &bid.impid, "missing_imp_id");
            continue;
        }

        let Some(imp) = request.imp_by_id(&bid.impid) else {
            reject(&bid.id, &bid.impid, "unknown_imp_id");
            continue;
        };

        if !bid.price.is_finite() || bid.price < 0.0 || bid.price > settings.price_ceiling {
            reject(&bid.id, &bid.impid, "unreasonable_price");
            continue;
        }

        let Some(price) = rates.convert(bid.price, bid_currency, response_currency) else {
            reject(&bid.id, &bid.impid, "currency");
            continue;
        };

        let Some(floor) = rates.convert(imp.bidfloor, &imp.bidfloorcur, response_currency) else {
            reject(&bid.id, &bid.impid, "currency");
            continue;
        };

        if price < floor {
            reject(&bid.id, &bid.impid, "below_floor");
            continue;
        }

        if bid.adm.is_none() && bid.nurl.is_none() {
            reject(&bid.id, &bid.impid, "missing_adm_and_nurl");
            continue;
        }

        if let Some(nurl) = bid.nurl.as_deref() {
            if !nurl_acceptable(nurl, settings.strict_nurl_https) {
                reject(&bid.id, &bid.impid, "invalid_nurl");
                continue;
            }
        }

        if adomain_blocked(&request.badv, &bid.adomain) {
            reject(&bid.id, &bid.impid, "blocked_adomain");
            continue;
        }

        if !media_type_compatible(typed.media_type, imp) {
            reject(&bid.id, &bid.impid, "media_type_mismatch");
            continue;
        }

        if typed.media_type == MediaType::Banner {
            if let Some(banner) = &imp.banner {
                if !banner_allows(banner, bid.w, bid.h) {
                    reject(&bid.id, &bid.impid, "banner_size_mismatch");
                    continue;
                }
            }
        }

        if typed.media_type == MediaType::Video {
            if let Some(video) = &imp.video {
                if let Some(protocol) = bid.protocol {
                    let allowed = crate::core::spec::protocols::is_valid(protocol)
                        && (video.protocols.is_empty() || video.protocols.contains(&protocol));
                    if !allowed {
                        reject(&bid.id, &bid.impid, "protocol_not_allowed");
                        continue;
                    }
                }

                if let Some(dur) = bid.dur {
                    let below = video.minduration.map(|min| dur < min).unwrap_or(false);
                    let above = video.maxduration.map(|max| dur > max).unwrap_or(false);
                    if below || above {
                        reject(&bid.id, &bid.impid, "duration_out_of_bounds");
                        continue;
                    }
                }
            }
        }

        let mut normalised = typed.clone();
        normalised.bid.price = price;
        accepted.push(normalised);
    }

    (accepted, rejections)
}

/// Win-notice URLs must be absolute http(s) with a host; strict mode
/// narrows to https only
fn nurl_acceptable(nurl: &str, strict_https: bool) -> bool {
    let Ok(url) = Url::parse(nurl) else {
        return false;
    };

    let scheme_ok = if strict_https {
        url.scheme() == "https"
    } else {
        url.scheme() == "http" || url.scheme() == "https"
    };

    scheme_ok && url.host_str().map(|h| !h.is_empty()).unwrap_or(false)
}

fn media_type_compatible(media_type: MediaType, imp: &Imp) -> bool {
    match media_type {
        MediaType::Video => imp.video.is_some(),
        MediaType::Native => imp.native.is_some(),
        MediaType::Audio => imp.audio.is_some(),
        MediaType::Banner => imp.banner.is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::openrtb::BidBuilder;
    use crate::core::openrtb::request::{Banner, Format, Video};

    fn request() -> BidRequest {
        BidRequest {
            id: "r1".into(),
            cur: vec!["USD".into()],
            badv: vec!["evil.com".into()],
            imp: vec![
                Imp {
                    id: "imp1".into(),
                    bidfloor: 1.0,
                    bidfloorcur: "USD".into(),
                    video: Some(Video {
                        mimes: vec!["video/mp4".into()],
                        minduration: Some(5),
                        maxduration: Some(30),
                        protocols: vec![2, 3, 5, 6],
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                Imp {
                    id: "imp2".into(),
                    banner: Some(Banner {
                        format: vec![Format { w: 300, h: 250 }, Format { w: 728, h: 90 }],
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    fn rates() -> CurrencyRates {
        CurrencyRates::new([("EUR".to_string(), 1.0)])
    }

    fn video_bid(id: &str, price: f64) -> TypedBid {
        TypedBid {
            bid: BidBuilder::default()
                .id(id.to_string())
                .impid("imp1".to_string())
                .price(price)
                .adm(Some("<VAST version=\"4.0\"></VAST>".to_string()))
                .protocol(Some(3))
                .build()
                .unwrap(),
            media_type: MediaType::Video,
        }
    }

    fn validate(response: BidderResponse) -> (Vec<TypedBid>, Vec<BidValidationError>) {
        validate_bidder_response(
            &request(),
            "bidder-x",
            &response,
            &AuctionSettings::default(),
            &rates(),
            "USD",
        )
    }

    fn response_of(bids: Vec<TypedBid>) -> BidderResponse {
        BidderResponse {
            id: "r1".into(),
            currency: "USD".into(),
            bids,
        }
    }

    #[test]
    fn test_valid_video_bid_accepted() {
        let (accepted, rejections) = validate(response_of(vec![video_bid("b1", 2.5)]));

        assert_eq!(accepted.len(), 1);
        assert!(rejections.is_empty());
        assert_eq!(accepted[0].bid.price, 2.5);
    }

    #[test]
    fn test_mismatched_response_id_rejects_all() {
        let mut response = response_of(vec![video_bid("b1", 2.5), video_bid("b2", 3.0)]);
        response.id = "other".into();

        let (accepted, rejections) = validate(response);

        assert!(accepted.is_empty());
        assert_eq!(rejections.len(), 2);
        assert_eq!(rejections[0].reason, "response_id_mismatch");
    }

    #[test]
    fn test_empty_response_id_rejects_all() {
        let mut response = response_of(vec![video_bid("b1", 2.5)]);
        response.id = "".into();

        let (accepted, rejections) = validate(response);

        assert!(accepted.is_empty());
        assert_eq!(rejections[0].reason, "response_id_mismatch");
    }

    #[test]
    fn test_disallowed_currency_rejects_all() {
        let mut response = response_of(vec![video_bid("b1", 2.5), video_bid("b2", 3.0)]);
        response.currency = "EUR".into();

        let (accepted, rejections) = validate(response);

        assert!(accepted.is_empty());
        assert_eq!(rejections.len(), 2);
        assert_eq!(rejections[0].reason, "currency_not_allowed");
    }

    #[test]
    fn test_empty_currency_defaults_to_usd() {
        let mut response = response_of(vec![video_bid("b1", 2.5)]);
        response.currency = "".into();

        let (accepted, _) = validate(response);
        assert_eq!(accepted.len(), 1);
    }

    #[test]
    fn test_below_floor_rejected() {
        let (accepted, rejections) = validate(response_of(vec![video_bid("b1", 0.5)]));

        assert!(accepted.is_empty());
        assert_eq!(rejections[0].reason, "below_floor");
    }

    #[test]
    fn test_unknown_imp_rejected() {
        let mut bid = video_bid("b1", 2.5);
        bid.bid.impid = "ghost".into();

        let (accepted, rejections) = validate(response_of(vec![bid]));

        assert!(accepted.is_empty());
        assert_eq!(rejections[0].reason, "unknown_imp_id");
    }

    #[test]
    fn test_unreasonable_prices_rejected() {
        for price in [f64::NAN, f64::INFINITY, -1.0, 2_000_000.0] {
            let (accepted, rejections) = validate(response_of(vec![video_bid("b1", price)]));
            assert!(accepted.is_empty(), "price {} should be rejected", price);
            assert_eq!(rejections[0].reason, "unreasonable_price");
        }
    }

    #[test]
    fn test_blocked_adomain_rejected() {
        let mut bid = video_bid("b1", 2.5);
        bid.bid.adomain = vec!["EVIL.com".into()];

        let (accepted, rejections) = validate(response_of(vec![bid]));

        assert!(accepted.is_empty());
        assert_eq!(rejections[0].reason, "blocked_adomain");
    }

    #[test]
    fn test_missing_adm_and_nurl_rejected() {
        let mut bid = video_bid("b1", 2.5);
        bid.bid.adm = None;
        bid.bid.nurl = None;

        let (_, rejections) = validate(response_of(vec![bid]));
        assert_eq!(rejections[0].reason, "missing_adm_and_nurl");
    }

    #[test]
    fn test_nurl_scheme_validation() {
        let mut bid = video_bid("b1", 2.5);
        bid.bid.adm = None;
        bid.bid.nurl = Some("ftp://dsp.example/win".into());

        let (_, rejections) = validate(response_of(vec![bid]));
        assert_eq!(rejections[0].reason, "invalid_nurl");
    }

    #[test]
    fn test_strict_mode_requires_https_nurl() {
        let mut settings = AuctionSettings::default();
        settings.strict_nurl_https = true;

        let mut bid = video_bid("b1", 2.5);
        bid.bid.adm = None;
        bid.bid.nurl = Some("http://dsp.example/win".into());

        let (accepted, rejections) = validate_bidder_response(
            &request(),
            "bidder-x",
            &response_of(vec![bid]),
            &settings,
            &rates(),
            "USD",
        );

        assert!(accepted.is_empty());
        assert_eq!(rejections[0].reason, "invalid_nurl");
    }

    #[test]
    fn test_duplicate_bid_ids_rejected() {
        let (accepted, rejections) =
            validate(response_of(vec![video_bid("b1", 2.5), video_bid("b1", 3.0)]));

        assert_eq!(accepted.len(), 1);
        assert_eq!(rejections[0].reason, "duplicate_bid_id");
    }

    #[test]
    fn test_banner_size_mismatch_rejected() {
        let bid = TypedBid {
            bid: BidBuilder::default()
                .id("b1".to_string())
                .impid("imp2".to_string())
                .price(1.5)
                .adm(Some("<div/>".to_string()))
                .w(Some(400))
                .h(Some(400))
                .build()
                .unwrap(),
            media_type: MediaType::Banner,
        };

        let (accepted, rejections) = validate(response_of(vec![bid]));

        assert!(accepted.is_empty());
        assert_eq!(rejections[0].reason, "banner_size_mismatch");
    }

    #[test]
    fn test_banner_allowed_size_accepted() {
        let bid = TypedBid {
            bid: BidBuilder::default()
                .id("b1".to_string())
                .impid("imp2".to_string())
                .price(1.5)
                .adm(Some("<div/>".to_string()))
                .w(Some(728))
                .h(Some(90))
                .build()
                .unwrap(),
            media_type: MediaType::Banner,
        };

        let (accepted, _) = validate(response_of(vec![bid]));
        assert_eq!(accepted.len(), 1);
    }

    #[test]
    fn test_video_claim_on_banner_imp_rejected() {
        let mut bid = video_bid("b1", 2.5);
        bid.bid.impid = "imp2".into();

        let (_, rejections) = validate(response_of(vec![bid]));
        assert_eq!(rejections[0].reason, "media_type_mismatch");
    }

    #[test]
    fn test_protocol_not_in_allowlist_rejected() {
        let mut bid = video_bid("b1", 2.5);
        bid.bid.protocol = Some(9);

        let (_, rejections) = validate(response_of(vec![bid]));
        assert_eq!(rejections[0].reason, "protocol_not_allowed");
    }

    #[test]
    fn test_duration_out_of_bounds_rejected() {
        let mut bid = video_bid("b1", 2.5);
        bid.bid.dur = Some(45);

        let (_, rejections) = validate(response_of(vec![bid]));
        assert_eq!(rejections[0].reason, "duration_out_of_bounds");
    }

    #[test]
    fn test_price_normalised_to_response_currency() {
        let rates = CurrencyRates::new([("EUR".to_string(), 0.5)]);
        let mut response = response_of(vec![video_bid("b1", 2.0)]);
        response.currency = "EUR".into();

        let request = BidRequest {
            cur: vec!["USD".into(), "EUR".into()],
            ..request()
        };

        let (accepted, _) = validate_bidder_response(
            &request,
            "bidder-x",
            &response,
            &AuctionSettings::default(),
            &rates,
            "USD",
        );

        // 2.0 EUR at 0.5 EUR/USD is 4.0 USD
        assert_eq!(accepted.len(), 1);
        assert!((accepted[0].bid.price - 4.0).abs() < 1e-9);
    }
}
