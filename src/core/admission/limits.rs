use crate::error::VexError;
use actix_web::HttpRequest;
use actix_web::web::Bytes;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_REQUEST_SIZE: usize = 1024 * 1024;
const DEFAULT_MAX_URL_LENGTH: usize = 8 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeLimits {
    pub max_request_size: usize,
    pub max_url_length: usize,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            max_url_length: DEFAULT_MAX_URL_LENGTH,
        }
    }
}

/// Cheapest admission stage: header-only size checks before any body
/// byte is read. On body-carrying methods an unknown Content-Length is
/// rejected outright.
pub fn check_size_caps(req: &HttpRequest, limits: &SizeLimits) -> Result<(), VexError> {
    let uri_len = req.uri().to_string().len();
    if uri_len > limits.max_url_length {
        metrics::counter!("vex_admission_rejects_total", "reason" => "uri_too_long").increment(1);
        return Err(VexError::UriTooLong);
    }

    let bodyless = matches!(
        *req.method(),
        actix_web::http::Method::GET
            | actix_web::http::Method::HEAD
            | actix_web::http::Method::OPTIONS
    );
    if bodyless {
        return Ok(());
    }

    let content_length = req
        .headers()
        .get(actix_web::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(-1);

    if content_length < 0 || content_length as usize > limits.max_request_size {
        metrics::counter!("vex_admission_rejects_total", "reason" => "body_too_large").increment(1);
        return Err(VexError::BodyTooLarge);
    }

    Ok(())
}

/// Bounded body reader. The stream itself is capped independently of
/// the Content-Length header; crossing the cap is a 413.
pub async fn read_capped_body(
    mut payload: actix_web::web::Payload,
    cap: usize,
) -> Result<Bytes, VexError> {
    let mut body = Vec::new();

    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| VexError::Internal(anyhow::anyhow!("body read: {}", e)))?;

        if body.len() + chunk.len() > cap {
            metrics::counter!("vex_admission_rejects_total", "reason" => "body_too_large")
                .increment(1);
            return Err(VexError::BodyTooLarge);
        }

        body.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(body))
}
