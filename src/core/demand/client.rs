use crate::core::adapters::{RequestData, ResponseData};
use anyhow::anyhow;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, redirect};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const TCP_KEEPALIVE: Duration = Duration::from_secs(20);
const POOL_MAX_IDLE_PER_HOST: usize = 128;

/// Outbound HTTP client for bidder callouts: connection pooled, TLS
/// validated, redirects refused, every call bounded by the caller's
/// deadline and a body cap.
pub struct DemandClient {
    client: Client,
}

impl DemandClient {
    /// Eagerly builds the underlying client so a broken TLS or DNS
    /// setup fails at startup instead of on the first auction
    pub fn new() -> Result<Self, anyhow::Error> {
        let client = reqwest::ClientBuilder::new()
            .user_agent("vex-exchange")
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(Some(POOL_IDLE_TIMEOUT))
            .tcp_keepalive(Some(TCP_KEEPALIVE))
            .tcp_nodelay(true)
            .referer(false)
            .redirect(redirect::Policy::none())
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(anyhow::Error::from)?;

        Ok(Self { client })
    }

    /// Execute one adapter request descriptor.
    ///
    /// A completed HTTP exchange is `Ok` regardless of status code;
    /// only transport failures (connect, timeout, oversize body) are
    /// errors. Non-200 responses skip the body read entirely.
    pub async fn send(
        &self,
        request: &RequestData,
        timeout: Duration,
        max_body: usize,
    ) -> Result<ResponseData, anyhow::Error> {
        let method = Method::from_str(&request.method)
            .map_err(|_| anyhow!("invalid method {}", request.method))?;

        let mut headers = HeaderMap::new();
        for (key, value) in &request.headers {
            let key = HeaderName::from_str(key).map_err(|e| anyhow!("invalid header: {}", e))?;
            let value =
                HeaderValue::from_str(value).map_err(|e| anyhow!("invalid header value: {}", e))?;
            headers.insert(key, value);
        }

        let response = self
            .client
            .request(method, &request.uri)
            .headers(headers)
            .body(request.body.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| anyhow!("callout to {} failed: {}", request.uri, e))?;

        let status = response.status().as_u16();

        if status != 200 {
            debug!("Non-200 demand status {}, skipping body", status);
            return Ok(ResponseData {
                status,
                body: bytes::Bytes::new(),
            });
        }

        if let Some(length) = response.content_length() {
            if length as usize > max_body {
                return Err(anyhow!("demand response body {} over cap", length));
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| anyhow!("demand body read failed: {}", e))?;

        if body.len() > max_body {
            return Err(anyhow!("demand response body {} over cap", body.len()));
        }

        Ok(ResponseData { status, body })
    }
}
