pub mod auction;
pub mod cache;
pub mod events;
pub mod pause;
pub mod status;
pub mod sync;
pub mod video;

use crate::app::pipeline::auction::{AuctionContext, BidResponseState};
use crate::core::admission::{check_size_caps, read_capped_body};
use crate::core::openrtb::BidRequest;
use crate::error::VexError;
use crate::server::state::AppState;
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, web};
use std::net::IpAddr;
use tracing::debug;

/// 1x1 transparent GIF served by pixel endpoints
pub const TRANSPARENT_GIF: [u8; 43] = [
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

pub fn pixel_response() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("image/gif")
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .body(TRANSPARENT_GIF.to_vec())
}

/// Client IP derivation. X-Forwarded-For is honored only when the
/// peer itself sits inside a trusted proxy range; everyone else gets
/// judged by their socket address.
pub fn client_ip(req: &HttpRequest, state: &AppState) -> Option<IpAddr> {
    let peer = req.peer_addr().map(|addr| addr.ip())?;

    let peer_trusted = state
        .trusted_proxies
        .iter()
        .any(|network| network.contains(peer));

    if peer_trusted {
        if let Some(forwarded) = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
        {
            if let Some(first) = forwarded.split(',').next() {
                if let Ok(ip) = first.trim().parse() {
                    return Some(ip);
                }
            }
        }
    }

    Some(peer)
}

fn header_string(req: &HttpRequest, name: header::HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Admission stages that run before the body is even read: size caps,
/// then API-key auth. Returns the authenticated publisher binding.
pub async fn admit(req: &HttpRequest, state: &AppState) -> Result<Option<String>, VexError> {
    check_size_caps(req, &state.config.limits)?;

    if !state.auth.enabled() || state.auth.bypassed(req.path()) {
        return Ok(None);
    }

    let Some(key) = state.auth.extract_key(req) else {
        metrics::counter!("vex_auth_failures_total", "tier" => "missing_key").increment(1);
        return Err(VexError::MissingApiKey);
    };

    let publisher_id = state.auth.validate(&key).await?;

    Ok(Some(publisher_id))
}

/// Shared auction execution: admission guards, bounded body read,
/// parse, pipeline. The caller renders the outcome per its wire shape.
pub async fn run_auction_from_body(
    req: HttpRequest,
    payload: web::Payload,
    state: &AppState,
    source: &str,
) -> Result<AuctionContext, VexError> {
    let auth_publisher_id = admit(&req, state).await?;

    let body = read_capped_body(payload, state.config.limits.max_request_size).await?;

    let bid_request: BidRequest = serde_json::from_slice(&body)
        .map_err(|e| VexError::Validation(format!("malformed bid request: {e}")))?;

    run_auction(req, state, source, bid_request, auth_publisher_id).await
}

pub async fn run_auction(
    req: HttpRequest,
    state: &AppState,
    source: &str,
    bid_request: BidRequest,
    auth_publisher_id: Option<String>,
) -> Result<AuctionContext, VexError> {
    let mut context = AuctionContext::new(source, bid_request);
    context.auth_publisher_id = auth_publisher_id;
    context.client_ip = client_ip(&req, state);
    context.ua = header_string(&req, header::USER_AGENT);
    context.referer = header_string(&req, header::REFERER);
    context.debug = state.config.auction.debug;

    let root_span = crate::sample_or_attach_root_span!(
        state.config.logging.span_sample_rate,
        "handle_bid_request"
    );

    let run = async {
        match state.auction_pipeline.run(&context).await {
            Ok(_) => debug!("Request pipeline success"),
            Err(e) => debug!("Request pipeline aborted: {}", e),
        }
    };

    tracing::Instrument::instrument(run, root_span).await;

    // Admission rejections surface as their HTTP status, never as a
    // no-bid body
    if let Some(rejection) = context.reject.take() {
        return Err(rejection);
    }

    Ok(context)
}

/// Render the auction outcome as the OpenRTB JSON shape
pub fn render_json(context: AuctionContext, source: &str) -> HttpResponse {
    use crate::core::observability::counters;

    let state = context.res.into_inner();

    match state {
        Some(BidResponseState::Bid(response)) => {
            counters::record_auction(source, "bid");
            HttpResponse::Ok()
                .content_type(header::ContentType::json())
                .json(response)
        }
        Some(BidResponseState::NoBidReason { reqid, nbr, desc }) => {
            counters::record_auction(source, "no_bid_reason");
            let body: Option<crate::core::openrtb::BidResponse> =
                BidResponseState::NoBidReason { reqid, nbr, desc }.into();
            HttpResponse::Ok()
                .content_type(header::ContentType::json())
                .json(body)
        }
        _ => {
            counters::record_auction(source, "no_bid");
            HttpResponse::NoContent().finish()
        }
    }
}
