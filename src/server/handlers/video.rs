use crate::app::pipeline::auction::{AuctionContext, BidResponseState};
use crate::core::observability::counters;
use crate::core::openrtb::BidRequest;
use crate::core::openrtb::request::{Imp, Publisher as RtbPublisher, Site, Video};
use crate::core::vast;
use crate::error::VexError;
use crate::server::handlers::{admit, run_auction, run_auction_from_body};
use crate::server::state::AppState;
use actix_web::{HttpRequest, HttpResponse, web};
use std::collections::HashMap;
use uuid::Uuid;

const VAST_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

fn vast_ok(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(VAST_CONTENT_TYPE)
        .insert_header(("Access-Control-Allow-Origin", "*"))
        .body(body)
}

/// Render the auction outcome as VAST. Per VAST convention every
/// outcome is HTTP 200: winners become documents, no-bids become an
/// empty VAST, and request-level errors become an error VAST.
fn render_vast(context: AuctionContext, state: &AppState, source: &str) -> HttpResponse {
    let req = context.req.read().clone();

    match context.res.get() {
        Some(BidResponseState::Bid(response)) => {
            counters::record_auction(source, "bid");

            match vast::build_vast_response(&req, response, Some(state.events.as_ref())) {
                Ok(xml) => vast_ok(xml),
                Err(e) => {
                    tracing::warn!("VAST assembly failed: {}", e);
                    vast_ok(vast::empty_vast())
                }
            }
        }
        _ => {
            counters::record_auction(source, "no_bid");
            vast_ok(vast::empty_vast())
        }
    }
}

/// VAST-shaped rejection mapping: request validation problems answer
/// with an error VAST (still 200); everything else keeps its HTTP
/// status from the JSON taxonomy.
fn render_vast_rejection(rejection: VexError, state: &AppState) -> Result<HttpResponse, VexError> {
    match rejection {
        VexError::Validation(_) => {
            let error_url = state.events.error_url("", "", "exchange");
            Ok(vast_ok(vast::error_vast(&error_url)))
        }
        other => Err(other),
    }
}

/// POST /video/openrtb — OpenRTB request in, VAST XML out
pub async fn video_openrtb(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, VexError> {
    let source = "/video/openrtb";

    match run_auction_from_body(req, payload, &state, source).await {
        Ok(context) => Ok(render_vast(context, &state, source)),
        Err(rejection) => render_vast_rejection(rejection, &state),
    }
}

fn query_i32(query: &HashMap<String, String>, name: &str, default: i32) -> i32 {
    query
        .get(name)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

fn query_f64(query: &HashMap<String, String>, name: &str, default: f64) -> f64 {
    query
        .get(name)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

fn query_csv_u32(query: &HashMap<String, String>, name: &str, default: &[u32]) -> Vec<u32> {
    match query.get(name) {
        Some(raw) => {
            let parsed: Vec<u32> = raw
                .split(',')
                .filter_map(|part| part.trim().parse().ok())
                .collect();
            if parsed.is_empty() {
                default.to_vec()
            } else {
                parsed
            }
        }
        None => default.to_vec(),
    }
}

fn query_csv(query: &HashMap<String, String>, name: &str, default: &[&str]) -> Vec<String> {
    match query.get(name) {
        Some(raw) => {
            let parsed: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(String::from)
                .collect();
            if parsed.is_empty() {
                default.iter().map(|s| s.to_string()).collect()
            } else {
                parsed
            }
        }
        None => default.iter().map(|s| s.to_string()).collect(),
    }
}

/// Synthesise an OpenRTB request from VAST tag query parameters.
/// Unparseable numbers silently fall back to their defaults.
pub fn bid_request_from_query(query: &HashMap<String, String>) -> BidRequest {
    let id = query
        .get("id")
        .cloned()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let video = Video {
        mimes: query_csv(query, "mimes", &["video/mp4", "video/webm"]),
        minduration: Some(query_i32(query, "mindur", 5)),
        maxduration: Some(query_i32(query, "maxdur", 30)),
        protocols: query_csv_u32(query, "protocols", &[2, 3, 5, 6]),
        w: Some(query_i32(query, "w", 1920)),
        h: Some(query_i32(query, "h", 1080)),
        placement: Some(query_i32(query, "placement", 1) as u32),
        minbitrate: Some(query_i32(query, "minbitrate", 300)),
        maxbitrate: Some(query_i32(query, "maxbitrate", 5000)),
        skip: query.get("skip").and_then(|raw| raw.parse().ok()),
        skipafter: query.get("skipafter").and_then(|raw| raw.parse().ok()),
        ..Default::default()
    };

    BidRequest {
        id,
        imp: vec![Imp {
            id: "1".to_string(),
            video: Some(video),
            bidfloor: query_f64(query, "bidfloor", 0.0),
            ..Default::default()
        }],
        site: Some(Site {
            id: query.get("site_id").cloned(),
            domain: query.get("domain").cloned(),
            page: query.get("page").cloned(),
            publisher: query.get("site_id").map(|id| RtbPublisher {
                id: Some(id.clone()),
                ..Default::default()
            }),
            ..Default::default()
        }),
        cur: vec!["USD".to_string()],
        ..Default::default()
    }
}

/// GET /video/vast — query params in, VAST XML out
pub async fn video_vast(
    req: HttpRequest,
    query: web::Query<HashMap<String, String>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, VexError> {
    let source = "/video/vast";

    let auth_publisher_id = match admit(&req, &state).await {
        Ok(binding) => binding,
        Err(rejection) => return render_vast_rejection(rejection, &state),
    };

    let bid_request = bid_request_from_query(&query);

    match run_auction(req, &state, source, bid_request, auth_publisher_id).await {
        Ok(context) => Ok(render_vast(context, &state, source)),
        Err(rejection) => render_vast_rejection(rejection, &state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_synthesis_defaults() {
        let request = bid_request_from_query(&HashMap::new());

        assert!(!request.id.is_empty());
        assert_eq!(request.imp.len(), 1);

        let video = request.imp[0].video.as_ref().unwrap();
        assert_eq!(video.w, Some(1920));
        assert_eq!(video.h, Some(1080));
        assert_eq!(video.minduration, Some(5));
        assert_eq!(video.maxduration, Some(30));
        assert_eq!(video.protocols, vec![2, 3, 5, 6]);
        assert_eq!(video.mimes, vec!["video/mp4", "video/webm"]);
        assert_eq!(video.minbitrate, Some(300));
        assert_eq!(video.maxbitrate, Some(5000));
        assert_eq!(request.imp[0].bidfloor, 0.0);
    }

    #[test]
    fn test_query_synthesis_overrides() {
        let query = HashMap::from([
            ("id".to_string(), "tag-1".to_string()),
            ("w".to_string(), "640".to_string()),
            ("h".to_string(), "480".to_string()),
            ("bidfloor".to_string(), "2.5".to_string()),
            ("mimes".to_string(), "video/webm".to_string()),
            ("protocols".to_string(), "7,8".to_string()),
            ("domain".to_string(), "news.example.com".to_string()),
        ]);

        let request = bid_request_from_query(&query);

        assert_eq!(request.id, "tag-1");
        let video = request.imp[0].video.as_ref().unwrap();
        assert_eq!(video.w, Some(640));
        assert_eq!(video.protocols, vec![7, 8]);
        assert_eq!(video.mimes, vec!["video/webm"]);
        assert_eq!(request.imp[0].bidfloor, 2.5);
        assert_eq!(
            request.site.as_ref().unwrap().domain.as_deref(),
            Some("news.example.com")
        );
    }

    #[test]
    fn test_query_synthesis_garbage_falls_back() {
        let query = HashMap::from([
            ("w".to_string(), "banana".to_string()),
            ("bidfloor".to_string(), "not-a-float".to_string()),
        ]);

        let request = bid_request_from_query(&query);

        assert_eq!(request.imp[0].video.as_ref().unwrap().w, Some(1920));
        assert_eq!(request.imp[0].bidfloor, 0.0);
    }
}
