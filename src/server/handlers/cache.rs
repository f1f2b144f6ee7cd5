use crate::core::adcache::{MAX_PUT_BODY, PutEntry, PutResponseEntry, UUID_PARAM_MAX};
use crate::core::admission::read_capped_body;
use crate::error::VexError;
use crate::server::state::AppState;
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, HttpResponseBuilder, web};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The cache protocol is called cross-origin by video players, so
/// every response carries the permissive CORS set
fn with_cors(mut builder: HttpResponseBuilder) -> HttpResponseBuilder {
    builder.insert_header(("Access-Control-Allow-Origin", "*"));
    builder.insert_header(("Access-Control-Allow-Methods", "GET, POST, OPTIONS"));
    builder.insert_header(("Access-Control-Allow-Headers", "Content-Type"));
    builder
}

#[derive(Debug, Deserialize)]
struct PutRequest {
    puts: Vec<PutEntry>,
}

#[derive(Debug, Serialize)]
struct PutResponse {
    responses: Vec<PutResponseEntry>,
}

/// POST /cache — Prebid-Cache compatible store
pub async fn cache_put(
    _req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, VexError> {
    let body = read_capped_body(payload, MAX_PUT_BODY).await?;

    let put: PutRequest = serde_json::from_slice(&body)
        .map_err(|e| VexError::Validation(format!("malformed cache put: {e}")))?;

    if put.puts.is_empty() {
        return Err(VexError::Validation("empty puts list".into()));
    }

    for entry in &put.puts {
        if entry.media_type != "xml" && entry.media_type != "json" {
            return Err(VexError::Validation(format!(
                "unsupported cache entry type '{}'",
                entry.media_type
            )));
        }
    }

    let uuids = state.adcache.put(put.puts);

    let response = PutResponse {
        responses: uuids
            .into_iter()
            .map(|uuid| PutResponseEntry { uuid })
            .collect(),
    };

    Ok(with_cors(HttpResponse::Ok())
        .content_type(header::ContentType::json())
        .json(response))
}

/// GET /cache?uuid=… — serve the raw entry with its stored type
pub async fn cache_get(
    query: web::Query<HashMap<String, String>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, VexError> {
    let uuid = query
        .get("uuid")
        .ok_or_else(|| VexError::Validation("missing uuid parameter".into()))?;

    if uuid.is_empty() || uuid.len() > UUID_PARAM_MAX {
        return Err(VexError::Validation("invalid uuid parameter".into()));
    }

    match state.adcache.get(uuid) {
        Some(entry) => Ok(with_cors(HttpResponse::Ok())
            .content_type(entry.content_type())
            .body(entry.payload.clone())),
        None => Ok(with_cors(HttpResponse::NotFound()).finish()),
    }
}

/// OPTIONS /cache — CORS preflight
pub async fn cache_options() -> HttpResponse {
    with_cors(HttpResponse::Ok()).finish()
}
