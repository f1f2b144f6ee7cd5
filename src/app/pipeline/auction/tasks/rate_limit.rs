use crate::app::pipeline::auction::context::AuctionContext;
use crate::core::admission::PublisherRateLimiter;
use crate::error::VexError;
use crate::pipeline::BlockingTask;
use anyhow::{Error, bail};
use std::sync::Arc;
use tracing::debug;

/// Per-publisher token-bucket gate. Runs after publisher resolution;
/// bucket keys are resolved publisher ids, never raw caller input.
pub struct RateLimitTask {
    limiter: Arc<PublisherRateLimiter>,
    enabled: bool,
}

impl RateLimitTask {
    pub fn new(limiter: Arc<PublisherRateLimiter>, enabled: bool) -> Self {
        Self { limiter, enabled }
    }
}

impl BlockingTask<AuctionContext, Error> for RateLimitTask {
    fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        if !self.enabled {
            return Ok(());
        }

        let span =
            crate::child_span_info!("rate_limit_task", allowed = tracing::field::Empty).entered();

        let publisher_id = match context.publisher.get() {
            Some(publisher) => publisher.id.clone(),
            // Resolution disabled upstream: fall back to the key binding
            None => context
                .auth_publisher_id
                .clone()
                .unwrap_or_else(|| "anonymous".to_string()),
        };

        let decision = self.limiter.check(&publisher_id);

        span.record("allowed", decision.allowed);

        if !decision.allowed {
            context
                .reject
                .set(VexError::RateLimited {
                    limit: decision.limit,
                })
                .ok();
            bail!("publisher {} over rate limit", publisher_id);
        }

        debug!(
            "Publisher {} within rate limit, {} remaining",
            publisher_id, decision.remaining
        );

        Ok(())
    }
}
