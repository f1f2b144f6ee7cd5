use crate::app::config::AuctionSettings;
use crate::app::pipeline::auction::context::{
    AuctionContext, BidResponseState, BidderCallout, CalloutOutcome, CalloutSkipReason,
};
use crate::app::pipeline::auction::validation::validate_bidder_response;
use crate::core::adapters::ExtraRequestInfo;
use crate::core::breaker::CircuitBreaker;
use crate::core::currency::{CurrencyConverter, CurrencyRates};
use crate::core::demand::DemandClient;
use crate::core::observability::counters;
use crate::core::openrtb::BidRequest;
use crate::core::spec::nobidreasons;
use crate::pipeline::AsyncTask;
use anyhow::Error;
use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, warn};

/// The fan-out stage: one concurrent task per matched bidder, all
/// bounded by the request deadline. The deadline cancels every
/// outstanding callout at once; whatever has landed in the write-once
/// outcome slots by then is what the auction settles on. A bidder cut
/// off mid-flight is recorded as a breaker failure.
pub struct BidderCalloutsTask {
    client: Arc<DemandClient>,
    breaker: Arc<CircuitBreaker>,
    currency: Arc<CurrencyConverter>,
    settings: AuctionSettings,
}

impl BidderCalloutsTask {
    pub fn new(
        client: Arc<DemandClient>,
        breaker: Arc<CircuitBreaker>,
        currency: Arc<CurrencyConverter>,
        settings: AuctionSettings,
    ) -> Self {
        Self {
            client,
            breaker,
            currency,
            settings,
        }
    }

    async fn run_callout(
        &self,
        context: &AuctionContext,
        callout: &BidderCallout,
        request: &BidRequest,
        extra: &ExtraRequestInfo,
        per_bidder_timeout: Duration,
        rates: &CurrencyRates,
        response_currency: &str,
    ) {
        let code = callout.bidder.code();

        if callout.bidder.throttled() {
            callout.skip_reason.set(CalloutSkipReason::QpsThrottled).ok();
            context.push_error(code, "qps", "bidder qps saturated".into());
            counters::record_bidder_error(code, "qps");
            return;
        }

        let (requests, make_errors) = callout.bidder.adapter.make_requests(request, extra);

        for error in make_errors {
            context.push_error(code, "make_requests", error.to_string());
            counters::record_bidder_error(code, "make_requests");
        }

        if requests.is_empty() {
            // A valid "no bid" signal
            callout.outcome.set(CalloutOutcome::default()).ok();
            return;
        }

        let mut outcome = CalloutOutcome::default();

        for request_data in &requests {
            if !self.breaker.try_acquire(code) {
                callout.skip_reason.set(CalloutSkipReason::CircuitOpen).ok();
                context.push_error(code, "circuit_open", "circuit breaker open".into());
                counters::record_bidder_error(code, "circuit_open");
                continue;
            }

            let response = match self
                .client
                .send(request_data, per_bidder_timeout, self.settings.max_demand_body)
                .await
            {
                Ok(response) => {
                    self.breaker.record_success(code);
                    response
                }
                Err(error) => {
                    self.breaker.record_failure(code);
                    context.push_error(code, "http", error.to_string());
                    counters::record_bidder_error(code, "http");
                    continue;
                }
            };

            let (parsed, bid_errors) = callout.bidder.adapter.make_bids(request, &response);

            for error in bid_errors {
                context.push_error(code, "make_bids", error.to_string());
                counters::record_bidder_error(code, "make_bids");
            }

            let Some(parsed) = parsed else {
                continue;
            };

            counters::record_bids_received(code, parsed.bids.len());

            let (accepted, rejections) = validate_bidder_response(
                request,
                code,
                &parsed,
                &self.settings,
                rates,
                response_currency,
            );

            for rejection in &rejections {
                debug!(
                    "Dropped bid {} from {} for imp {}: {}",
                    rejection.bid_id, rejection.bidder_code, rejection.imp_id, rejection.reason
                );
            }

            outcome.bids.extend(accepted);
            outcome.rejections.extend(rejections);
        }

        callout.outcome.set(outcome).ok();
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        let Some(callouts) = context.callouts.get() else {
            // Matching short-circuited upstream
            return Ok(());
        };

        // One immutable copy of the (possibly scrubbed) request is
        // shared by every adapter
        let request = context.req.read().clone();

        let total_budget = self.settings.clamp_tmax(request.tmax);
        let remaining = total_budget.saturating_sub(context.started.elapsed());

        if remaining.is_zero() {
            warn!("Deadline exhausted before fan-out");
            context
                .res
                .set(BidResponseState::NoBidReason {
                    reqid: context.original_auction_id.clone(),
                    nbr: nobidreasons::INSUFFICIENT_AUCTION_TIME,
                    desc: Some("Deadline exhausted before fan-out"),
                })
                .ok();
            return Ok(());
        }

        let per_bidder_timeout = remaining.min(Duration::from_millis(
            self.settings.max_bidder_timeout_ms,
        ));

        let rates = self.currency.snapshot();
        let response_currency = context.settle_currency();
        let extra = ExtraRequestInfo {
            response_currency: response_currency.clone(),
        };

        let futures: Vec<_> = callouts
            .iter()
            .map(|callout| {
                self.run_callout(
                    context,
                    callout,
                    &request,
                    &extra,
                    per_bidder_timeout,
                    &rates,
                    &response_currency,
                )
            })
            .collect();

        let timed_out = tokio::time::timeout(remaining, join_all(futures))
            .await
            .is_err();

        let arrived = callouts
            .iter()
            .filter(|callout| callout.outcome.get().is_some())
            .count();

        debug!(
            "Fan-out complete: {}/{} bidders answered, timed_out={}",
            arrived,
            callouts.len(),
            timed_out
        );

        if timed_out {
            for callout in callouts.iter() {
                if callout.outcome.get().is_none() && callout.skip_reason.get().is_none() {
                    let code = callout.bidder.code();
                    self.breaker.record_failure(code);
                    context.push_error(code, "timeout", "bidder missed deadline".into());
                    counters::record_bidder_error(code, "timeout");
                }
            }
        }

        if timed_out && arrived == 0 {
            context
                .res
                .set(BidResponseState::NoBidReason {
                    reqid: context.original_auction_id.clone(),
                    nbr: nobidreasons::AUCTION_TIMEOUT,
                    desc: Some("No bidder answered in time"),
                })
                .ok();
        }

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for BidderCalloutsTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = crate::child_span_info!(
            "bidder_callouts_task",
            bidders = tracing::field::Empty
        );

        self.run0(context).instrument(span).await
    }
}
