use crate::app::pipeline::events::context::VideoEventContext;
use crate::app::pipeline::events::tasks::{ExtractEventTask, RecordEventTask};
use crate::pipeline::{Pipeline, PipelineBuilder};
use anyhow::Error;

/// Pipeline for the video event tracking endpoints. Kept deliberately
/// small: extract, then count. Billing-grade processing belongs to an
/// external consumer of the logs.
pub fn build_event_pipeline() -> Pipeline<VideoEventContext, Error> {
    PipelineBuilder::new()
        .with_blocking(Box::new(ExtractEventTask))
        .with_blocking(Box::new(RecordEventTask))
        .build()
        .expect("Event pipeline should have tasks")
}
