use crate::app::pipeline::auction::context::{AuctionContext, BidResponseState};
use crate::core::openrtb::validation::validate_bid_request;
use crate::core::spec::nobidreasons;
use crate::error::VexError;
use crate::pipeline::BlockingTask;
use anyhow::{Error, anyhow, bail};
use tracing::debug;

/// Structural request validation. Failures here are the only fatal
/// request outcome: HTTP 400 on the JSON endpoint, error VAST on the
/// video endpoints.
pub struct ValidateRequestTask;

impl BlockingTask<AuctionContext, Error> for ValidateRequestTask {
    fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = crate::child_span_info!(
            "request_validate_task",
            invalid_reason = tracing::field::Empty
        )
        .entered();

        let outcome = validate_bid_request(&context.req.read());

        if let Err(reason) = outcome {
            span.record("invalid_reason", reason.as_str());

            context
                .res
                .set(BidResponseState::NoBidReason {
                    reqid: context.original_auction_id.clone(),
                    nbr: nobidreasons::INVALID_REQUEST,
                    desc: Some("Invalid request"),
                })
                .map_err(|_| anyhow!("response state already assigned"))?;

            context
                .reject
                .set(VexError::Validation(reason.clone()))
                .ok();

            bail!("request failed validation: {}", reason);
        }

        // Decide the settle currency up front so fan-out and
        // settlement agree on it
        let currency = {
            let req = context.req.read();
            req.cur
                .first()
                .map(|cur| cur.to_ascii_uppercase())
                .unwrap_or_else(|| "USD".to_string())
        };
        context.response_currency.set(currency).ok();

        debug!("Request passed validation");
        span.record("invalid_reason", "none");

        Ok(())
    }
}
