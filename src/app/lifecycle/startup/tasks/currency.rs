use crate::app::lifecycle::context::StartupContext;
use crate::core::currency::CurrencyConverter;
use crate::pipeline::BlockingTask;
use anyhow::{Error, anyhow};
use std::sync::Arc;

/// Seeds the currency snapshot and spawns the periodic refresh loop
pub(crate) struct CurrencyStartTask;

impl BlockingTask<StartupContext, anyhow::Error> for CurrencyStartTask {
    fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = context
            .config
            .get()
            .ok_or_else(|| anyhow!("config missing during currency start"))?;

        let converter = Arc::new(CurrencyConverter::new(config.currency.clone()));

        let refresher = Arc::clone(&converter);
        actix_web::rt::spawn(async move {
            refresher.refresh_loop(reqwest::Client::new()).await;
        });

        context
            .currency
            .set(converter)
            .map_err(|_| anyhow!("currency converter already set"))?;

        Ok(())
    }
}
