use crate::app::lifecycle::context::StartupContext;
use crate::app::lifecycle::startup::tasks::adcache::AdCacheInitTask;
use crate::app::lifecycle::startup::tasks::admission::AdmissionBuildTask;
use crate::app::lifecycle::startup::tasks::config_load::ConfigLoadTask;
use crate::app::lifecycle::startup::tasks::currency::CurrencyStartTask;
use crate::app::lifecycle::startup::tasks::geo_load::GeoLoadTask;
use crate::app::lifecycle::startup::tasks::managers_load::ManagersLoadTask;
use crate::app::lifecycle::startup::tasks::observability::ConfigureObservabilityTask;
use crate::app::lifecycle::startup::tasks::pipelines::BuildPipelinesTask;
use crate::app::lifecycle::startup::tasks::start_server::StartServerTask;
use crate::app::lifecycle::startup::tasks::stores::StoresInitTask;
use crate::app::span::WrappedPipelineTask;
use crate::pipeline::{Pipeline, PipelineBuilder};
use std::path::PathBuf;
use tracing::{Span, info_span};

/// Builds the graceful ordering of startup tasks required for a
/// successful boot: config and logging first, then stores, admission,
/// managers, pipelines, and finally the listener. Any task error
/// aborts startup and the process exits non-zero.
pub fn build_start_pipeline(cfg_path: PathBuf) -> Pipeline<StartupContext, anyhow::Error> {
    // Config and logging must exist before anything can log through
    // the subscriber; spans started earlier would be dropped
    let boot_loader = PipelineBuilder::new()
        .with_blocking(Box::new(ConfigLoadTask::new(cfg_path)))
        .with_blocking(Box::new(ConfigureObservabilityTask))
        .build()
        .expect("Bootloader should have tasks!");

    let start_pipeline = PipelineBuilder::new()
        .with_async(Box::new(StoresInitTask))
        .with_blocking(Box::new(GeoLoadTask))
        .with_blocking(Box::new(AdmissionBuildTask))
        .with_blocking(Box::new(ManagersLoadTask))
        .with_blocking(Box::new(CurrencyStartTask))
        .with_blocking(Box::new(AdCacheInitTask))
        .with_blocking(Box::new(BuildPipelinesTask))
        .with_async(Box::new(StartServerTask))
        .build()
        .expect("Startup pipeline should have tasks!");

    let nop_bootloader_pipeline = WrappedPipelineTask::new(boot_loader, Span::none);

    let observed_startup_pipeline =
        WrappedPipelineTask::new(start_pipeline, || info_span!("start_pipeline"));

    PipelineBuilder::new()
        .with_async(Box::new(nop_bootloader_pipeline))
        .with_async(Box::new(observed_startup_pipeline))
        .build()
        .expect("Pipeline should have tasks!")
}
