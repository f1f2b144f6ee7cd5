pub mod auth;
pub mod ivt;
pub mod limits;
pub mod privacy;
pub mod ratelimit;

pub use auth::{ApiKeyValidator, AuthConfig};
pub use ivt::{IvtConfig, IvtInput, IvtScorer, IvtVerdict};
pub use limits::{SizeLimits, check_size_caps, read_capped_body};
pub use privacy::{PrivacyContext, anonymize_ip, truncate_ua};
pub use ratelimit::{PublisherRateLimiter, RateLimitConfig, RateLimitDecision};
