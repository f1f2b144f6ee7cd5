use crate::app::lifecycle::context::StartupContext;
use crate::app::pipeline::auction::build_auction_pipeline;
use crate::app::pipeline::events::build_event_pipeline;
use crate::app::pipeline::syncing::{build_sync_in_pipeline, build_sync_out_pipeline};
use crate::pipeline::BlockingTask;
use anyhow::{Error, anyhow};
use std::sync::Arc;

/// Builds every request pipeline once all managers and stores exist
pub(crate) struct BuildPipelinesTask;

impl BlockingTask<StartupContext, anyhow::Error> for BuildPipelinesTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let auction = build_auction_pipeline(context)?;
        context
            .auction_pipeline
            .set(Arc::new(auction))
            .map_err(|_| anyhow!("auction pipeline already set"))?;

        context
            .event_pipeline
            .set(Arc::new(build_event_pipeline()))
            .map_err(|_| anyhow!("event pipeline already set"))?;

        let bidder_manager = context
            .bidder_manager
            .get()
            .ok_or_else(|| anyhow!("bidder manager missing building sync pipelines"))?
            .clone();

        context
            .sync_out_pipeline
            .set(Arc::new(build_sync_out_pipeline(bidder_manager)))
            .map_err(|_| anyhow!("sync-out pipeline already set"))?;

        let sync_store = context
            .sync_store
            .get()
            .ok_or_else(|| anyhow!("sync store missing building sync pipelines"))?
            .clone();

        context
            .sync_in_pipeline
            .set(Arc::new(build_sync_in_pipeline(sync_store)))
            .map_err(|_| anyhow!("sync-in pipeline already set"))?;

        Ok(())
    }
}
