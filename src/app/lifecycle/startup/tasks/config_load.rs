use crate::app::config::VexConfig;
use crate::app::lifecycle::context::StartupContext;
use crate::pipeline::BlockingTask;
use anyhow::{Error, anyhow};
use std::path::PathBuf;

pub(crate) struct ConfigLoadTask {
    path: PathBuf,
}

impl ConfigLoadTask {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl BlockingTask<StartupContext, anyhow::Error> for ConfigLoadTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = VexConfig::load(&self.path)?;

        println!("Config loaded from {}", self.path.display());

        context
            .config
            .set(config)
            .map_err(|_| anyhow!("config already set on startup context"))?;

        Ok(())
    }
}
