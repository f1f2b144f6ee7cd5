use crate::app::lifecycle::context::StartupContext;
use crate::core::geo::GeoResolver;
use crate::pipeline::BlockingTask;
use anyhow::{Context, Error, anyhow};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const GEO_CACHE_SIZE: usize = 100_000;
const GEO_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Loads the CIDR->country table when a geo db path is configured.
/// A configured-but-unloadable table is a fatal startup condition.
pub(crate) struct GeoLoadTask;

impl BlockingTask<StartupContext, anyhow::Error> for GeoLoadTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = context
            .config
            .get()
            .ok_or_else(|| anyhow!("config missing during geo load"))?;

        let geo = match &config.geoip_path {
            Some(path) => {
                let resolver = GeoResolver::try_new(path, GEO_CACHE_SIZE, GEO_CACHE_TTL)
                    .with_context(|| format!("loading geo table {}", path.display()))?;

                info!("Loaded {} geo ranges", resolver.ranges());
                Some(Arc::new(resolver))
            }
            None => None,
        };

        context
            .geo
            .set(geo)
            .map_err(|_| anyhow!("geo resolver already set on context"))?;

        Ok(())
    }
}
