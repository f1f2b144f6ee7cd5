use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for request handling.
///
/// Every variant maps to a terminal HTTP response with a minimal JSON
/// body. Bodies are built through serde so caller-supplied text can
/// never break out of the JSON string it is reflected into. Internal
/// detail (including source chains) stays in the logs.
#[derive(Error, Debug)]
pub enum VexError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("missing API key")]
    MissingApiKey,

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("rate limit exceeded")]
    RateLimited { limit: u32 },

    #[error("request body too large")]
    BodyTooLarge,

    #[error("request URI too long")]
    UriTooLong,

    #[error("traffic rejected")]
    IvtBlocked,

    #[error("publisher rejected: {0}")]
    PublisherBlocked(String),

    #[error("cache store failure: {0}")]
    CacheStore(String),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ResponseError for VexError {
    fn status_code(&self) -> StatusCode {
        match self {
            VexError::Validation(_) => StatusCode::BAD_REQUEST,
            VexError::MissingApiKey => StatusCode::UNAUTHORIZED,
            VexError::InvalidApiKey => StatusCode::FORBIDDEN,
            VexError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            VexError::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            VexError::UriTooLong => StatusCode::URI_TOO_LONG,
            VexError::IvtBlocked => StatusCode::FORBIDDEN,
            VexError::PublisherBlocked(_) => StatusCode::FORBIDDEN,
            VexError::CacheStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            VexError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        builder.content_type("application/json");

        if let VexError::RateLimited { limit } = self {
            builder.insert_header(("Retry-After", "1"));
            builder.insert_header(("X-RateLimit-Limit", limit.to_string()));
            builder.insert_header(("X-RateLimit-Remaining", "0"));
        }

        builder.json(json!({ "error": self.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            VexError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            VexError::MissingApiKey.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(VexError::InvalidApiKey.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            VexError::RateLimited { limit: 100 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            VexError::BodyTooLarge.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(VexError::UriTooLong.status_code(), StatusCode::URI_TOO_LONG);
        assert_eq!(VexError::IvtBlocked.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            VexError::CacheStore("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rate_limit_headers_present() {
        let res = VexError::RateLimited { limit: 100 }.error_response();

        assert_eq!(res.headers().get("Retry-After").unwrap(), "1");
        assert_eq!(res.headers().get("X-RateLimit-Limit").unwrap(), "100");
        assert_eq!(res.headers().get("X-RateLimit-Remaining").unwrap(), "0");
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let err = VexError::Internal(anyhow::anyhow!("db password leaked"));
        assert_eq!(err.to_string(), "internal error");
    }
}
