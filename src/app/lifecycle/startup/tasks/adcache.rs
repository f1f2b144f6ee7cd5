use crate::app::lifecycle::context::StartupContext;
use crate::core::adcache::AdCache;
use crate::core::vast::EventUrlBuilder;
use crate::pipeline::BlockingTask;
use anyhow::{Context, Error, anyhow};
use std::sync::Arc;

/// Creates the creative cache and the tracking URL factory. A
/// malformed tracking base URL is a fatal startup condition.
pub(crate) struct AdCacheInitTask;

impl BlockingTask<StartupContext, anyhow::Error> for AdCacheInitTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = context
            .config
            .get()
            .ok_or_else(|| anyhow!("config missing during cache init"))?;

        context
            .adcache
            .set(Arc::new(AdCache::new(&config.cache)))
            .map_err(|_| anyhow!("ad cache already set"))?;

        let events = EventUrlBuilder::new(&config.tracking.events_base_url)
            .context("tracking base URL")?;

        context
            .events
            .set(Arc::new(events))
            .map_err(|_| anyhow!("event url builder already set"))?;

        Ok(())
    }
}
