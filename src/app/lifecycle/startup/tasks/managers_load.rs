use crate::app::lifecycle::context::StartupContext;
use crate::core::adapters::AdapterRegistry;
use crate::core::breaker::CircuitBreaker;
use crate::core::managers::{BidderManager, PublisherManager};
use crate::core::usersync::LocalSyncStore;
use crate::pipeline::BlockingTask;
use anyhow::{Context, Error, anyhow, bail};
use std::sync::Arc;
use tracing::info;

/// Builds the publisher resolution chain, the static bidder registry,
/// the per-bidder circuit breakers, and the sync match table.
pub(crate) struct ManagersLoadTask;

impl BlockingTask<StartupContext, anyhow::Error> for ManagersLoadTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = context
            .config
            .get()
            .ok_or_else(|| anyhow!("config missing during manager load"))?;

        let kv = context
            .kv
            .get()
            .ok_or_else(|| anyhow!("kv slot not initialised before manager load"))?
            .clone();

        // The relational publisher directory is externally owned;
        // deployments plug it in here when present
        let pub_manager = Arc::new(PublisherManager::new(
            &config.publishers.registered,
            kv,
            None,
        ));
        context
            .pub_manager
            .set(pub_manager)
            .map_err(|_| anyhow!("publisher manager already set"))?;

        if config.bidders.is_empty() {
            bail!("no bidders registered; refusing to start an exchange with no demand");
        }

        let registry = AdapterRegistry::from_settings(&config.bidders)
            .context("building bidder registry")?;

        info!("Registered {} bidders", registry.len());

        context
            .bidder_manager
            .set(Arc::new(BidderManager::new(registry)))
            .map_err(|_| anyhow!("bidder manager already set"))?;

        context
            .breaker
            .set(Arc::new(CircuitBreaker::new(config.breaker.clone())))
            .map_err(|_| anyhow!("circuit breaker already set"))?;

        context
            .sync_store
            .set(Arc::new(LocalSyncStore::new(config.sync.ttl)))
            .map_err(|_| anyhow!("sync store already set"))?;

        Ok(())
    }
}
