use crate::app::pipeline::syncing::context::{SyncInContext, SyncOutContext};
use crate::core::managers::BidderManager;
use crate::core::observability::counters;
use crate::core::usersync::{SyncStore, utils};
use crate::pipeline::{AsyncTask, BlockingTask};
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Reuse the caller's exchange uid when it carries our prefix,
/// otherwise mint a fresh one
pub struct ExtractLocalUidTask;

impl BlockingTask<SyncOutContext, Error> for ExtractLocalUidTask {
    fn run(&self, context: &SyncOutContext) -> Result<(), Error> {
        let uid = match &context.existing_uid {
            Some(existing) if utils::validate_local_id(existing) => existing.clone(),
            _ => utils::generate_local_id(),
        };

        context
            .local_uid
            .set(uid)
            .map_err(|_| anyhow!("local uid already set"))?;

        Ok(())
    }
}

/// Builds the pixel iframe content for all syncable bidders. With
/// consent withheld the response body stays empty; the caller still
/// receives the success shape.
pub struct BuildSyncHtmlTask {
    bidder_manager: Arc<BidderManager>,
}

impl BuildSyncHtmlTask {
    pub fn new(bidder_manager: Arc<BidderManager>) -> Self {
        Self { bidder_manager }
    }
}

impl BlockingTask<SyncOutContext, Error> for BuildSyncHtmlTask {
    fn run(&self, context: &SyncOutContext) -> Result<(), Error> {
        if !context.consent_ok {
            debug!("Sync-out without valid consent, returning empty pixel set");
            counters::record_user_sync("out", false);
            context
                .html
                .set(String::new())
                .map_err(|_| anyhow!("sync html already set"))?;
            return Ok(());
        }

        let local_uid = context
            .local_uid
            .get()
            .ok_or_else(|| anyhow!("local uid missing on sync-out context"))?;

        let html = utils::generate_sync_iframe_html(
            local_uid,
            self.bidder_manager.all(),
            context.pub_sync.clone(),
        );

        counters::record_user_sync("out", true);

        context
            .html
            .set(html)
            .map_err(|_| anyhow!("sync html already set"))?;

        Ok(())
    }
}

/// Stores an inbound partner uid in the match table. Consentless or
/// incomplete calls store nothing but still succeed, so partners see
/// the transparent-pixel success shape either way.
pub struct StoreBuyerUidTask {
    store: Arc<dyn SyncStore>,
}

impl StoreBuyerUidTask {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AsyncTask<SyncInContext, Error> for StoreBuyerUidTask {
    async fn run(&self, context: &SyncInContext) -> Result<(), Error> {
        let complete = context.consent_ok
            && context.partner_id.as_deref().map(|p| !p.is_empty()).unwrap_or(false)
            && context.remote_uid.as_deref().map(|r| !r.is_empty()).unwrap_or(false)
            && context
                .local_uid
                .as_deref()
                .map(utils::validate_local_id)
                .unwrap_or(false);

        if !complete {
            debug!("Sync-in skipped: consent or identifiers missing");
            counters::record_user_sync("in", false);
            context.stored.set(false).ok();
            return Ok(());
        }

        let partner_id = context.partner_id.as_deref().unwrap_or_default();
        let remote_uid = context.remote_uid.clone().unwrap_or_default();
        let local_uid = context.local_uid.as_deref().unwrap_or_default();

        self.store.append(local_uid, partner_id, remote_uid).await;

        counters::record_user_sync("in", true);
        context.stored.set(true).ok();

        debug!("Stored partner {} uid for {}", partner_id, local_uid);

        Ok(())
    }
}
