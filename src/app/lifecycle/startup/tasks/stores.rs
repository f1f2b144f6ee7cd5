use crate::app::lifecycle::context::StartupContext;
use crate::core::stores::{KvStore, RedisStore};
use crate::pipeline::AsyncTask;
use anyhow::{Error, anyhow, bail};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Connects the external KV store when configured. An unreachable
/// store is fatal only in strict deployments; otherwise the tiers
/// that consult it simply fall through.
pub(crate) struct StoresInitTask;

#[async_trait]
impl AsyncTask<StartupContext, anyhow::Error> for StoresInitTask {
    async fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = context
            .config
            .get()
            .ok_or_else(|| anyhow!("config missing during store init"))?;

        let kv: Option<Arc<dyn KvStore>> = if config.kv.enabled {
            match RedisStore::connect(&config.kv.url).await {
                Ok(store) => {
                    info!("KV store connected");
                    Some(Arc::new(store))
                }
                Err(e) if config.kv.required => {
                    bail!("required KV store unreachable at boot: {}", e);
                }
                Err(e) => {
                    warn!("KV store unreachable, degrading to local tiers: {}", e);
                    None
                }
            }
        } else {
            None
        };

        context
            .kv
            .set(kv)
            .map_err(|_| anyhow!("kv store already set on context"))?;

        Ok(())
    }
}
