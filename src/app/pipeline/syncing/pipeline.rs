use crate::app::pipeline::syncing::context::{SyncInContext, SyncOutContext};
use crate::app::pipeline::syncing::tasks::{
    BuildSyncHtmlTask, ExtractLocalUidTask, StoreBuyerUidTask,
};
use crate::core::managers::BidderManager;
use crate::core::usersync::SyncStore;
use crate::pipeline::{Pipeline, PipelineBuilder};
use anyhow::Error;
use std::sync::Arc;

/// `/cookie_sync`: mint/reuse a local uid and emit partner pixels
pub fn build_sync_out_pipeline(
    bidder_manager: Arc<BidderManager>,
) -> Pipeline<SyncOutContext, Error> {
    PipelineBuilder::new()
        .with_blocking(Box::new(ExtractLocalUidTask))
        .with_blocking(Box::new(BuildSyncHtmlTask::new(bidder_manager)))
        .build()
        .expect("Sync-out pipeline should have tasks")
}

/// `/setuid`: accept a partner buyer uid into the match table
pub fn build_sync_in_pipeline(store: Arc<dyn SyncStore>) -> Pipeline<SyncInContext, Error> {
    PipelineBuilder::new()
        .with_async(Box::new(StoreBuyerUidTask::new(store)))
        .build()
        .expect("Sync-in pipeline should have tasks")
}
