use crate::app::pipeline::syncing::{SyncInContext, SyncOutContext};
use crate::core::admission::privacy::MIN_TCF_LENGTH;
use crate::core::usersync::constants::VEX_COOKIE_ID_PARAM;
use crate::error::VexError;
use crate::server::handlers::pixel_response;
use crate::server::state::AppState;
use actix_web::cookie::{Cookie, time::Duration as CookieDuration};
use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// GDPR/TCF gate shared by both sync endpoints: when GDPR applies,
/// identifiers may only be stored under a plausibly valid consent
/// string
fn consent_ok(gdpr: Option<u8>, consent: Option<&str>) -> bool {
    if gdpr != Some(1) {
        return true;
    }

    consent.map(|c| c.len() >= MIN_TCF_LENGTH).unwrap_or(false)
}

#[derive(Debug, Deserialize, Default)]
pub struct CookieSyncRequest {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub gdpr: Option<u8>,
    #[serde(default)]
    pub gdpr_consent: Option<String>,
}

#[derive(Debug, Serialize)]
struct CookieSyncResponse {
    uid: String,
    html: String,
}

/// POST /cookie_sync — mint/reuse the exchange uid and answer with
/// partner sync pixels. An invalid TCF string gets the
/// transparent-pixel success shape with nothing stored.
pub async fn cookie_sync(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse, VexError> {
    let parsed: CookieSyncRequest = if body.is_empty() {
        CookieSyncRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| VexError::Validation(format!("malformed cookie_sync body: {e}")))?
    };

    let cookie_uid = req
        .cookie(VEX_COOKIE_ID_PARAM)
        .map(|cookie| cookie.value().to_string());

    let consent = consent_ok(parsed.gdpr, parsed.gdpr_consent.as_deref());

    let context = SyncOutContext::new(parsed.uid.or(cookie_uid), consent, None);

    state
        .sync_out_pipeline
        .run(&context)
        .await
        .map_err(VexError::Internal)?;

    // Rejected consent answers the pixel success shape; no cookie, no
    // identifiers
    if !consent {
        return Ok(pixel_response());
    }

    let uid = context.local_uid.get().cloned().unwrap_or_default();
    let html = context.html.get().cloned().unwrap_or_default();

    let mut response = HttpResponse::Ok();

    if !uid.is_empty() {
        let cookie = Cookie::build(VEX_COOKIE_ID_PARAM, uid.clone())
            .path("/")
            .max_age(CookieDuration::days(365))
            .http_only(true)
            .finish();
        response.cookie(cookie);
    }

    Ok(response.json(CookieSyncResponse { uid, html }))
}

/// GET/POST /setuid — accept a partner's buyer uid into the match
/// table. Answers the transparent pixel regardless of storage outcome,
/// including the invalid-TCF path.
pub async fn setuid(
    req: HttpRequest,
    query: web::Query<HashMap<String, String>>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let gdpr = query.get("gdpr").and_then(|raw| raw.parse().ok());
    let consent = consent_ok(gdpr, query.get("gdpr_consent").map(String::as_str));

    let local_uid = req
        .cookie(VEX_COOKIE_ID_PARAM)
        .map(|cookie| cookie.value().to_string())
        .or_else(|| query.get(VEX_COOKIE_ID_PARAM).cloned());

    let context = SyncInContext::new(
        query.get("pid").cloned(),
        query.get("buid").cloned(),
        local_uid,
        consent,
    );

    if let Err(e) = state.sync_in_pipeline.run(&context).await {
        debug!("Sync-in pipeline error: {}", e);
    }

    pixel_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consent_gate() {
        assert!(consent_ok(None, None));
        assert!(consent_ok(Some(0), None));
        assert!(!consent_ok(Some(1), None));
        assert!(!consent_ok(Some(1), Some("short")));
        assert!(consent_ok(Some(1), Some("CPc8a1JPc8a1JAKAaAENCt")));
    }
}
