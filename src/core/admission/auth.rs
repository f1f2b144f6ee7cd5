use crate::core::stores::KvStore;
use crate::error::VexError;
use actix_web::HttpRequest;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

fn default_header_name() -> String {
    "X-Api-Key".to_string()
}

fn default_bypass_paths() -> Vec<String> {
    vec!["/status".to_string(), "/health".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_positive_ttl() -> Duration {
    Duration::from_secs(300)
}

fn default_negative_ttl() -> Duration {
    Duration::from_secs(30)
}

fn default_max_entries() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secure by default; disabling requires an explicit opt-out
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_header_name")]
    pub header: String,

    /// Static key -> publisher id allowlist (lowest lookup tier)
    #[serde(default)]
    pub keys: HashMap<String, String>,

    /// Consult the external KV store on cache miss
    #[serde(default)]
    pub use_kv: bool,

    /// Paths reachable without a key, matched exactly or by prefix
    /// followed by `/` or `?`
    #[serde(default = "default_bypass_paths")]
    pub bypass_paths: Vec<String>,

    #[serde(default = "default_positive_ttl", with = "humantime_serde")]
    pub positive_ttl: Duration,

    #[serde(default = "default_negative_ttl", with = "humantime_serde")]
    pub negative_ttl: Duration,

    #[serde(default = "default_max_entries")]
    pub max_cache_entries: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header: default_header_name(),
            keys: HashMap::new(),
            use_kv: false,
            bypass_paths: default_bypass_paths(),
            positive_ttl: default_positive_ttl(),
            negative_ttl: default_negative_ttl(),
            max_cache_entries: default_max_entries(),
        }
    }
}

/// API-key validation with a three-tier lookup: in-process cache,
/// external KV store, static allowlist. Negative results are cached
/// with the shorter TTL.
pub struct ApiKeyValidator {
    config: AuthConfig,
    positive: Cache<String, String>,
    negative: Cache<String, ()>,
    kv: Option<Arc<dyn KvStore>>,
}

impl ApiKeyValidator {
    pub fn new(config: AuthConfig, kv: Option<Arc<dyn KvStore>>) -> Self {
        let positive = Cache::builder()
            .max_capacity(config.max_cache_entries)
            .time_to_live(config.positive_ttl)
            .build();

        let negative = Cache::builder()
            .max_capacity(config.max_cache_entries)
            .time_to_live(config.negative_ttl)
            .build();

        Self {
            config,
            positive,
            negative,
            kv,
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Bypass paths match exactly, or as a prefix followed by `/` or
    /// `?`. Plain prefixing would let `/statusanything` ride on
    /// `/status`.
    pub fn bypassed(&self, path: &str) -> bool {
        self.config.bypass_paths.iter().any(|bypass| {
            if path == bypass {
                return true;
            }

            match path.strip_prefix(bypass.as_str()) {
                Some(rest) => rest.starts_with('/') || rest.starts_with('?'),
                None => false,
            }
        })
    }

    /// Pull the key from the configured header or a Bearer token
    pub fn extract_key(&self, req: &HttpRequest) -> Option<String> {
        if let Some(value) = req.headers().get(self.config.header.as_str()) {
            if let Ok(key) = value.to_str() {
                if !key.trim().is_empty() {
                    return Some(key.trim().to_string());
                }
            }
        }

        let auth = req.headers().get(actix_web::http::header::AUTHORIZATION)?;
        let auth = auth.to_str().ok()?;

        let mut parts = auth.splitn(2, ' ');
        let scheme = parts.next()?.trim();
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let token = parts.next()?.trim();
        if token.is_empty() {
            return None;
        }

        Some(token.to_string())
    }

    /// Validate a key, resolving it to a publisher id
    pub async fn validate(&self, key: &str) -> Result<String, VexError> {
        if let Some(publisher_id) = self.positive.get(key) {
            return Ok(publisher_id);
        }

        if self.negative.get(key).is_some() {
            metrics::counter!("vex_auth_failures_total", "tier" => "negative_cache").increment(1);
            return Err(VexError::InvalidApiKey);
        }

        if self.config.use_kv {
            if let Some(kv) = &self.kv {
                match kv.get(&format!("apikey:{key}")).await {
                    Ok(Some(publisher_id)) => {
                        self.positive.insert(key.to_string(), publisher_id.clone());
                        return Ok(publisher_id);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        // KV outage degrades to the static tier
                        warn!("API key KV lookup failed: {}", e);
                    }
                }
            }
        }

        if let Some(publisher_id) = self.allowlist_lookup(key) {
            self.positive.insert(key.to_string(), publisher_id.clone());
            return Ok(publisher_id);
        }

        debug!("Unknown API key rejected");
        self.negative.insert(key.to_string(), ());
        metrics::counter!("vex_auth_failures_total", "tier" => "unknown_key").increment(1);

        Err(VexError::InvalidApiKey)
    }

    /// Scans the full allowlist, comparing every entry in constant
    /// time, including after a match.
    fn allowlist_lookup(&self, key: &str) -> Option<String> {
        let mut matched: Option<&String> = None;

        for (candidate, publisher_id) in &self.config.keys {
            if constant_time_eq(candidate.as_bytes(), key.as_bytes()) {
                matched = Some(publisher_id);
            }
        }

        matched.cloned()
    }

    /// Drives expired-entry eviction; called from a periodic task
    pub fn purge_expired(&self) {
        self.positive.run_pending_tasks();
        self.negative.run_pending_tasks();
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let mut diff = (a.len() ^ b.len()) as u8;

    let longest = a.len().max(b.len());
    for i in 0..longest {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        diff |= x ^ y;
    }

    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stores::MemoryStore;
    use actix_web::test::TestRequest;

    fn validator_with_keys(keys: &[(&str, &str)]) -> ApiKeyValidator {
        let config = AuthConfig {
            keys: keys
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        };

        ApiKeyValidator::new(config, None)
    }

    #[actix_rt::test]
    async fn test_allowlist_key_resolves_publisher() {
        let validator = validator_with_keys(&[("k1", "pub1")]);

        assert_eq!(validator.validate("k1").await.unwrap(), "pub1");
    }

    #[actix_rt::test]
    async fn test_unknown_key_rejected_and_negative_cached() {
        let validator = validator_with_keys(&[("k1", "pub1")]);

        assert!(validator.validate("nope").await.is_err());
        // Second hit comes from the negative cache
        assert!(validator.validate("nope").await.is_err());
    }

    #[actix_rt::test]
    async fn test_kv_tier_consulted_on_miss() {
        let kv = Arc::new(MemoryStore::new());
        kv.set("apikey:remote-key", "pub-remote", None).await.unwrap();

        let config = AuthConfig {
            use_kv: true,
            ..Default::default()
        };
        let validator = ApiKeyValidator::new(config, Some(kv));

        assert_eq!(validator.validate("remote-key").await.unwrap(), "pub-remote");
    }

    #[test]
    fn test_bypass_requires_boundary() {
        let validator = validator_with_keys(&[]);

        assert!(validator.bypassed("/status"));
        assert!(validator.bypassed("/status/live"));
        assert!(validator.bypassed("/status?verbose=1"));
        assert!(!validator.bypassed("/statusanything"));
        assert!(!validator.bypassed("/openrtb2/auction"));
    }

    #[test]
    fn test_extract_key_from_header_and_bearer() {
        let validator = validator_with_keys(&[]);

        let req = TestRequest::post()
            .insert_header(("X-Api-Key", "abc"))
            .to_http_request();
        assert_eq!(validator.extract_key(&req).as_deref(), Some("abc"));

        let req = TestRequest::post()
            .insert_header(("Authorization", "Bearer tok123"))
            .to_http_request();
        assert_eq!(validator.extract_key(&req).as_deref(), Some("tok123"));

        let req = TestRequest::post()
            .insert_header(("Authorization", "Basic dXNlcg=="))
            .to_http_request();
        assert_eq!(validator.extract_key(&req), None);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secre_"));
        assert!(!constant_time_eq(b"secret", b"secretlonger"));
        assert!(!constant_time_eq(b"", b"x"));
        assert!(constant_time_eq(b"", b""));
    }
}
