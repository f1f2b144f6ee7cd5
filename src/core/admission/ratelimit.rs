use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

fn default_rps() -> f64 {
    100.0
}

fn default_burst() -> f64 {
    100.0
}

fn default_max_buckets() -> usize {
    1_000
}

fn default_idle_eviction() -> Duration {
    Duration::from_secs(3600)
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_rps")]
    pub rps: f64,

    #[serde(default = "default_burst")]
    pub burst: f64,

    /// Bucket map bound; crossing it triggers idle eviction
    #[serde(default = "default_max_buckets")]
    pub max_buckets: usize,

    #[serde(default = "default_idle_eviction", with = "humantime_serde")]
    pub idle_eviction: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rps: default_rps(),
            burst: default_burst(),
            max_buckets: default_max_buckets(),
            idle_eviction: default_idle_eviction(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
}

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

/// Per-publisher token buckets, keyed by caller-supplied publisher
/// ids. The map is bounded: when it grows past `max_buckets`, entries
/// idle for longer than `idle_eviction` are dropped opportunistically
/// on the next check. The lock is never held across I/O.
pub struct PublisherRateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl PublisherRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, publisher_id: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();

        if buckets.len() > self.config.max_buckets {
            let idle_cutoff = self.config.idle_eviction;
            let before = buckets.len();
            buckets.retain(|_, bucket| now.duration_since(bucket.last_seen) < idle_cutoff);
            debug!("Evicted {} idle rate buckets", before - buckets.len());
        }

        let bucket = buckets
            .entry(publisher_id.to_string())
            .or_insert_with(|| TokenBucket {
                tokens: self.config.burst,
                last_refill: now,
                last_seen: now,
            });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.config.rps).min(self.config.burst);
        bucket.last_refill = now;
        bucket.last_seen = now;

        let limit = self.config.rps as u32;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            RateLimitDecision {
                allowed: true,
                limit,
                remaining: bucket.tokens.floor() as u32,
            }
        } else {
            metrics::counter!("vex_rate_limited_total", "publisher" => publisher_id.to_string())
                .increment(1);
            RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
            }
        }
    }

    #[cfg(test)]
    fn bucket_count(&self) -> usize {
        self.buckets.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(rps: f64, burst: f64) -> PublisherRateLimiter {
        PublisherRateLimiter::new(RateLimitConfig {
            rps,
            burst,
            ..Default::default()
        })
    }

    #[test]
    fn test_burst_bounds_instant_traffic() {
        let limiter = limiter(10.0, 5.0);

        let allowed = (0..100)
            .filter(|_| limiter.check("pub1").allowed)
            .count();

        // Over a ~zero-length window accepts are bounded by burst + 1
        assert!(allowed <= 6, "allowed {} exceeds burst bound", allowed);
        assert!(allowed >= 5);
    }

    #[test]
    fn test_tokens_refill_over_time() {
        let limiter = limiter(1000.0, 2.0);

        assert!(limiter.check("pub1").allowed);
        assert!(limiter.check("pub1").allowed);
        assert!(!limiter.check("pub1").allowed);

        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.check("pub1").allowed);
    }

    #[test]
    fn test_publishers_isolated() {
        let limiter = limiter(10.0, 1.0);

        assert!(limiter.check("pub1").allowed);
        assert!(!limiter.check("pub1").allowed);
        assert!(limiter.check("pub2").allowed);
    }

    #[test]
    fn test_denied_reports_zero_remaining() {
        let limiter = limiter(10.0, 1.0);

        let first = limiter.check("pub1");
        assert!(first.allowed);
        assert_eq!(first.limit, 10);

        let second = limiter.check("pub1");
        assert!(!second.allowed);
        assert_eq!(second.remaining, 0);
    }

    #[test]
    fn test_idle_buckets_evicted_past_bound() {
        let limiter = PublisherRateLimiter::new(RateLimitConfig {
            enabled: true,
            rps: 10.0,
            burst: 10.0,
            max_buckets: 10,
            idle_eviction: Duration::from_millis(1),
        });

        for i in 0..20 {
            limiter.check(&format!("pub{}", i));
        }

        std::thread::sleep(Duration::from_millis(5));

        // Next check trips the opportunistic sweep
        limiter.check("fresh");
        assert!(limiter.bucket_count() <= 2);
    }
}
