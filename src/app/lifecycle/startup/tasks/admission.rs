use crate::app::lifecycle::context::StartupContext;
use crate::core::admission::{ApiKeyValidator, IvtScorer, PublisherRateLimiter};
use crate::pipeline::BlockingTask;
use anyhow::{Error, anyhow};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const AUTH_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Builds the admission layer: API-key validator, per-publisher rate
/// limiter, and the IVT scorer. Also spawns the periodic purge of
/// expired auth cache entries.
pub(crate) struct AdmissionBuildTask;

impl BlockingTask<StartupContext, anyhow::Error> for AdmissionBuildTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = context
            .config
            .get()
            .ok_or_else(|| anyhow!("config missing during admission build"))?;

        let kv = context
            .kv
            .get()
            .ok_or_else(|| anyhow!("kv slot not initialised before admission build"))?
            .clone();

        let auth = Arc::new(ApiKeyValidator::new(config.auth.clone(), kv));

        let purge_target = Arc::clone(&auth);
        actix_web::rt::spawn(async move {
            loop {
                tokio::time::sleep(AUTH_PURGE_INTERVAL).await;
                purge_target.purge_expired();
            }
        });

        context
            .auth
            .set(auth)
            .map_err(|_| anyhow!("auth validator already set"))?;

        let rate_limiter = Arc::new(PublisherRateLimiter::new(
            config.publishers.rate_limit.clone(),
        ));
        context
            .rate_limiter
            .set(rate_limiter)
            .map_err(|_| anyhow!("rate limiter already set"))?;

        let geo = context
            .geo
            .get()
            .ok_or_else(|| anyhow!("geo slot not initialised before admission build"))?
            .clone();

        let scorer = Arc::new(IvtScorer::new(config.ivt.clone(), geo));
        context
            .ivt_scorer
            .set(scorer)
            .map_err(|_| anyhow!("ivt scorer already set"))?;

        debug!("Admission layer ready");

        Ok(())
    }
}
