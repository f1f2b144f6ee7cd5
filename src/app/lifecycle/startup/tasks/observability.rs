use crate::app::lifecycle::context::StartupContext;
use crate::core::observability::provider;
use crate::pipeline::BlockingTask;
use anyhow::{Error, anyhow};

pub(crate) struct ConfigureObservabilityTask;

impl BlockingTask<StartupContext, anyhow::Error> for ConfigureObservabilityTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = context
            .config
            .get()
            .ok_or_else(|| anyhow!("config missing during observability setup"))?;

        provider::init(&config.logging)?;

        Ok(())
    }
}
