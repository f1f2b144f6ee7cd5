use crate::app::pipeline::events::VideoEventContext;
use crate::core::models::events::VideoEventKind;
use crate::error::VexError;
use crate::server::handlers::pixel_response;
use crate::server::state::AppState;
use actix_web::{HttpRequest, HttpResponse, web};
use log::warn;
use std::collections::HashMap;
use std::str::FromStr;

/// GET pixel variant: always answers the transparent GIF, even when
/// the event is unusable, so players never see a broken beacon
pub async fn event_pixel(
    req: HttpRequest,
    query: web::Query<HashMap<String, String>>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let kind = kind_from_path(&req);
    let context = VideoEventContext::new(kind, query.into_inner(), None);

    if let Err(e) = state.event_pipeline.run(&context).await {
        warn!("Dropped unusable video event: {}", e);
    }

    pixel_response()
}

/// POST variant: 204 on success, 400 on a malformed body
pub async fn event_post(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, VexError> {
    let kind = kind_from_path(&req);

    let query = web::Query::<HashMap<String, String>>::from_query(req.query_string())
        .map(web::Query::into_inner)
        .unwrap_or_default();

    let context = VideoEventContext::new(kind, query, Some(body));

    state
        .event_pipeline
        .run(&context)
        .await
        .map_err(|e| VexError::Validation(format!("unusable event: {e}")))?;

    Ok(HttpResponse::NoContent().finish())
}

fn kind_from_path(req: &HttpRequest) -> Option<VideoEventKind> {
    let segment = req.path().rsplit('/').next()?;

    if segment == "event" {
        return None;
    }

    // The quartile route covers all three mid-play checkpoints; the
    // precise one arrives via the `event` param or body
    if segment == "quartile" {
        return None;
    }

    VideoEventKind::from_str(segment).ok()
}
