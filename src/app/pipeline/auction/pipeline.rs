use crate::app::lifecycle::context::StartupContext;
use crate::app::pipeline::auction::{AuctionContext, tasks};
use crate::core::demand::DemandClient;
use anyhow::{Error, anyhow, bail};
use crate::pipeline::{Pipeline, PipelineBuilder};

/// Build the pipeline an inbound bid request flows through.
///
/// Stage order is fixed and mirrors the admission contract: publisher
/// resolution and rate limiting, IVT scoring, privacy gating, then the
/// engine stages (validation, matching, fan-out, settlement). Cheap
/// rejections run before expensive work. Size caps and API-key auth
/// happen earlier still, at the HTTP handler, before JSON parsing.
pub fn build_auction_pipeline(
    context: &StartupContext,
) -> Result<Pipeline<AuctionContext, Error>, Error> {
    let config = context
        .config
        .get()
        .ok_or(anyhow!("config not set when building auction pipeline"))?;

    let pub_manager = match context.pub_manager.get() {
        Some(pub_manager) => pub_manager,
        None => bail!("No publisher manager?! Cant build auction pipeline"),
    };

    let bidder_manager = match context.bidder_manager.get() {
        Some(bidder_manager) => bidder_manager,
        None => bail!("No bidder manager?! Cant build auction pipeline"),
    };

    let rate_limiter = context
        .rate_limiter
        .get()
        .ok_or_else(|| anyhow!("Rate limiter not set on context"))?;

    let ivt_scorer = context
        .ivt_scorer
        .get()
        .ok_or_else(|| anyhow!("IVT scorer not set on context"))?;

    let breaker = context
        .breaker
        .get()
        .ok_or_else(|| anyhow!("Circuit breaker not set on context"))?;

    let currency = context
        .currency
        .get()
        .ok_or_else(|| anyhow!("Currency converter not set on context"))?;

    let demand_client = DemandClient::new()
        .or_else(|e| bail!("Auction pipeline demand client failed: {}", e))?;

    let pipeline = PipelineBuilder::new()
        .with_async(Box::new(tasks::PubResolveTask::new(
            pub_manager.clone(),
            config.publishers.clone(),
        )))
        .with_blocking(Box::new(tasks::RateLimitTask::new(
            rate_limiter.clone(),
            config.publishers.rate_limit.enabled,
        )))
        .with_blocking(Box::new(tasks::IvtScoreTask::new(ivt_scorer.clone())))
        .with_blocking(Box::new(tasks::PrivacyGateTask))
        .with_blocking(Box::new(tasks::ValidateRequestTask))
        .with_blocking(Box::new(tasks::BidderMatchTask::new(
            bidder_manager.clone(),
        )))
        .with_async(Box::new(tasks::BidderCalloutsTask::new(
            std::sync::Arc::new(demand_client),
            breaker.clone(),
            currency.clone(),
            config.auction.clone(),
        )))
        .with_async(Box::new(tasks::SettlementTask::new(config.auction.clone())))
        .build()
        .expect("Auction pipeline should have tasks");

    Ok(pipeline)
}
