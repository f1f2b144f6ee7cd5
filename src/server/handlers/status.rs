use actix_web::HttpResponse;
use serde_json::json;

/// GET /status — liveness; listed in the auth bypass set
pub async fn status() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
