use crate::app::pipeline::auction::context::{AuctionContext, BidResponseState, BidderCallout};
use crate::core::managers::BidderManager;
use crate::core::spec::nobidreasons;
use crate::pipeline::BlockingTask;
use anyhow::{Error, anyhow, bail};
use std::sync::Arc;
use tracing::debug;

/// Builds the callout list from registered bidders whose declared
/// support covers the request. Slots are created in sorted bidder-code
/// order, which fixes collection order and keeps tie-breaks
/// reproducible.
pub struct BidderMatchTask {
    manager: Arc<BidderManager>,
}

impl BidderMatchTask {
    pub fn new(manager: Arc<BidderManager>) -> Self {
        Self { manager }
    }
}

impl BlockingTask<AuctionContext, Error> for BidderMatchTask {
    fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = crate::child_span_info!(
            "bidder_match_task",
            matched = tracing::field::Empty
        )
        .entered();

        let matched = self.manager.matching(&context.req.read());

        span.record("matched", matched.len());

        if matched.is_empty() {
            context
                .res
                .set(BidResponseState::NoBidReason {
                    reqid: context.original_auction_id.clone(),
                    nbr: nobidreasons::NO_BUYERS_MATCHED,
                    desc: Some("No buyers matched"),
                })
                .ok();

            bail!("no bidders support this request");
        }

        debug!("Matched {} bidders", matched.len());

        let callouts = matched.into_iter().map(BidderCallout::new).collect();

        context
            .callouts
            .set(callouts)
            .map_err(|_| anyhow!("callouts already assigned on context"))?;

        Ok(())
    }
}
