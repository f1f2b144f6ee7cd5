use crate::app::pipeline::auction::BidResponseState;
use crate::core::openrtb::BidRequest;
use crate::core::openrtb::request::{Banner, Imp, Publisher as RtbPublisher, Site};
use crate::error::VexError;
use crate::server::handlers::{admit, run_auction};
use crate::server::state::AppState;
use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_pause_w() -> i32 {
    1920
}

fn default_pause_h() -> i32 {
    1080
}

/// CTV pause-screen ad request
#[derive(Debug, Deserialize)]
pub struct PauseAdRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_pause_w")]
    pub w: i32,
    #[serde(default = "default_pause_h")]
    pub h: i32,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub bidfloor: f64,
}

#[derive(Debug, Serialize)]
pub struct PauseAdResponse {
    pub id: String,
    pub nobid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub w: i32,
    pub h: i32,
}

/// POST /pause-ad — a banner auction shaped for pause screens
pub async fn pause_ad(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, VexError> {
    let source = "/pause-ad";
    let auth_publisher_id = admit(&req, &state).await?;

    let body =
        crate::core::admission::read_capped_body(payload, state.config.limits.max_request_size)
            .await?;

    let pause: PauseAdRequest = serde_json::from_slice(&body)
        .map_err(|e| VexError::Validation(format!("malformed pause-ad body: {e}")))?;
    let id = pause.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());

    let bid_request = BidRequest {
        id: id.clone(),
        imp: vec![Imp {
            id: "1".to_string(),
            banner: Some(Banner {
                w: Some(pause.w),
                h: Some(pause.h),
                ..Default::default()
            }),
            bidfloor: pause.bidfloor,
            ..Default::default()
        }],
        site: Some(Site {
            id: pause.site_id.clone(),
            domain: pause.domain.clone(),
            publisher: pause.site_id.map(|site_id| RtbPublisher {
                id: Some(site_id),
                ..Default::default()
            }),
            ..Default::default()
        }),
        cur: vec!["USD".to_string()],
        ..Default::default()
    };

    let context = run_auction(req, &state, source, bid_request, auth_publisher_id).await?;

    let response = match context.res.get() {
        Some(BidResponseState::Bid(bid_response)) => {
            let winner = bid_response
                .seatbid
                .first()
                .and_then(|seat| seat.bid.first());

            match winner {
                Some(bid) => PauseAdResponse {
                    id,
                    nobid: false,
                    adm: bid.adm.clone(),
                    price: Some(bid.price),
                    w: bid.w.unwrap_or(pause.w),
                    h: bid.h.unwrap_or(pause.h),
                },
                None => PauseAdResponse {
                    id,
                    nobid: true,
                    adm: None,
                    price: None,
                    w: pause.w,
                    h: pause.h,
                },
            }
        }
        _ => PauseAdResponse {
            id,
            nobid: true,
            adm: None,
            price: None,
            w: pause.w,
            h: pause.h,
        },
    };

    Ok(HttpResponse::Ok().json(response))
}
