use crate::app::config::AuctionSettings;
use crate::app::pipeline::auction::context::{AuctionContext, BidResponseState};
use crate::core::adapters::TypedBid;
use crate::core::observability::counters;
use crate::core::openrtb::{Bid, BidResponseBuilder, SeatBid, SeatBidBuilder};
use crate::core::spec::nobidreasons;
use crate::pipeline::AsyncTask;
use ahash::AHashMap;
use anyhow::{Error, bail};
use async_trait::async_trait;
use smallvec::SmallVec;
use tracing::{Instrument, debug, warn};

pub fn sort_bids_by_price(bids: &mut [Bid]) {
    bids.sort_by(|a, b| b.price.total_cmp(&a.price));
}

pub fn sort_seats_by_highest_bid(seats: &mut [SeatBid]) {
    seats.sort_by(|a, b| {
        let a_price = a.bid.first().map(|bid| bid.price).unwrap_or(0.0);
        let b_price = b.bid.first().map(|bid| bid.price).unwrap_or(0.0);
        b_price.total_cmp(&a_price)
    });
}

struct Candidate {
    bidder_code: String,
    typed: TypedBid,
}

/// Per-impression winner selection and response assembly.
///
/// Candidates are gathered in callout order (sorted bidder codes), so
/// a price tie always resolves to the same bidder for identical
/// inputs. The clearing price follows the request auction type;
/// losers are dropped unless debug mode keeps them.
pub struct SettlementTask {
    settings: AuctionSettings,
}

impl SettlementTask {
    pub fn new(settings: AuctionSettings) -> Self {
        Self { settings }
    }

    /// Clearing price for one impression's winner.
    ///
    /// First price: the winner's ask. Second price: the runner-up ask
    /// plus the configured increment, floored, and never above the
    /// ask. A lone bid clears at the floor unless the deployment opts
    /// into first-price-when-alone semantics.
    fn clearing_price(
        &self,
        auction_type: u32,
        ask: f64,
        second_ask: Option<f64>,
        floor: f64,
    ) -> f64 {
        if auction_type == 1 {
            return ask;
        }

        if second_ask.is_none() && self.settings.single_bid_first_price {
            return ask;
        }

        let second = second_ask.unwrap_or(0.0);
        let mut clearing = second + self.settings.second_price_increment;

        if clearing < floor {
            clearing = floor;
        }

        clearing.min(ask)
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        if context.res.get().is_some() {
            // An upstream stage already concluded the request
            return Ok(());
        }

        let Some(callouts) = context.callouts.get() else {
            return Ok(());
        };

        let req = context.req.read();
        let auction_type = req.auction_type();
        let currency = context.settle_currency();

        // Group accepted bids by impression, preserving callout order
        let mut by_imp: AHashMap<&str, Vec<Candidate>> = AHashMap::new();

        for callout in callouts.iter() {
            let Some(outcome) = callout.outcome.get() else {
                continue;
            };

            for typed in &outcome.bids {
                by_imp
                    .entry(typed.bid.impid.as_str())
                    .or_default()
                    .push(Candidate {
                        bidder_code: callout.bidder.code().to_string(),
                        typed: typed.clone(),
                    });
            }
        }

        let mut winners: Vec<Candidate> = Vec::new();
        let mut losers: Vec<Candidate> = Vec::new();

        // Iterate impressions in request order for deterministic output
        for imp in &req.imp {
            let Some(mut candidates) = by_imp.remove(imp.id.as_str()) else {
                continue;
            };

            let asks: SmallVec<[f64; 8]> =
                candidates.iter().map(|c| c.typed.bid.price).collect();

            // First-seen max wins ties
            let mut winner_idx = 0;
            for (idx, ask) in asks.iter().enumerate() {
                if *ask > asks[winner_idx] {
                    winner_idx = idx;
                }
            }

            let ask = asks[winner_idx];
            let second_ask = asks
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != winner_idx)
                .map(|(_, ask)| *ask)
                .max_by(|a, b| a.total_cmp(b));

            let clearing = self.clearing_price(auction_type, ask, second_ask, imp.bidfloor);

            let mut winner = candidates.swap_remove(winner_idx);
            winner.typed.bid.price = clearing;

            debug!(
                "Imp {} won by {} ask={} clearing={}",
                imp.id, winner.bidder_code, ask, clearing
            );
            counters::record_bid_won(&winner.bidder_code);

            winners.push(winner);
            losers.extend(candidates);
        }

        drop(req);

        if winners.is_empty() {
            // Zero seats is the plain no-bid outcome: 204 on the JSON
            // endpoint, empty VAST on the video endpoints
            let state = BidResponseState::NoBid {
                desc: Some("No bids received"),
            };

            if context.res.set(state).is_err() {
                bail!("built final no bid response but one already assigned");
            }

            debug!("Assigned no bid response to context");
            return Ok(());
        }

        let mut by_seat: AHashMap<String, Vec<Bid>> = AHashMap::new();
        for candidate in winners {
            by_seat
                .entry(candidate.bidder_code)
                .or_default()
                .push(candidate.typed.bid);
        }

        if self.settings.debug || context.debug {
            for candidate in losers {
                by_seat
                    .entry(candidate.bidder_code)
                    .or_default()
                    .push(candidate.typed.bid);
            }
        }

        let mut seats = Vec::with_capacity(by_seat.len());
        for (seat, mut bids) in by_seat {
            sort_bids_by_price(&mut bids);

            match SeatBidBuilder::default().seat(seat.clone()).bid(bids).build() {
                Ok(seat_bid) => seats.push(seat_bid),
                Err(_) => {
                    warn!("Failed to build seatbid for {}: skipping bids!", seat);
                }
            }
        }

        sort_seats_by_highest_bid(&mut seats);

        let response = match BidResponseBuilder::default()
            .id(context.original_auction_id.clone())
            .cur(currency)
            .seatbid(seats)
            .build()
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to build final BidResponse, skipping all bids! {}", e);

                context
                    .res
                    .set(BidResponseState::NoBidReason {
                        reqid: context.original_auction_id.clone(),
                        nbr: nobidreasons::TECHNICAL_ERROR,
                        desc: Some("Failed to build final response"),
                    })
                    .ok();

                bail!("failed to build final bid response: {}", e);
            }
        };

        if context.res.set(BidResponseState::Bid(response)).is_err() {
            bail!("built final bid response but one already assigned");
        }

        debug!("Assigned valid bid response to context");

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for SettlementTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = crate::child_span_info!("settlement_task");

        self.run0(context).instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::auction::context::{BidderCallout, CalloutOutcome};
    use crate::core::adapters::{AdapterRegistry, MediaType};
    use crate::core::models::bidder::BidderSettings;
    use crate::core::openrtb::request::{Imp, Site, Video};
    use crate::core::openrtb::{BidBuilder, BidRequest};
    use std::sync::Arc;

    fn request(auction_type: u32) -> BidRequest {
        BidRequest {
            id: "r1".into(),
            at: Some(auction_type),
            cur: vec!["USD".into()],
            site: Some(Site::default()),
            imp: vec![Imp {
                id: "imp1".into(),
                bidfloor: 1.0,
                video: Some(Video::default()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn typed_bid(id: &str, price: f64) -> TypedBid {
        TypedBid {
            bid: BidBuilder::default()
                .id(id.to_string())
                .impid("imp1".to_string())
                .price(price)
                .adm(Some("<VAST/>".to_string()))
                .build()
                .unwrap(),
            media_type: MediaType::Video,
        }
    }

    fn context_with_outcomes(
        auction_type: u32,
        outcomes: Vec<(&str, Vec<TypedBid>)>,
    ) -> AuctionContext {
        let settings: Vec<BidderSettings> = outcomes
            .iter()
            .map(|(code, _)| BidderSettings {
                code: code.to_string(),
                endpoint: "https://dsp.example/bid".into(),
                ..Default::default()
            })
            .collect();

        let registry = AdapterRegistry::from_settings(&settings).unwrap();

        let context = AuctionContext::new("/openrtb2/auction", request(auction_type));
        context.response_currency.set("USD".to_string()).ok();

        // Registry iteration is sorted by code; pair outcomes up
        let mut callouts = Vec::new();
        for bidder in registry.bidders() {
            let callout = BidderCallout::new(Arc::clone(bidder));
            let bids = outcomes
                .iter()
                .find(|(code, _)| code == &bidder.code())
                .map(|(_, bids)| bids.clone())
                .unwrap_or_default();

            callout
                .outcome
                .set(CalloutOutcome {
                    bids,
                    rejections: vec![],
                })
                .ok();
            callouts.push(callout);
        }

        context.callouts.set(callouts).ok();
        context
    }

    #[actix_rt::test]
    async fn test_first_price_keeps_ask() {
        let context = context_with_outcomes(1, vec![("x", vec![typed_bid("b1", 2.5)])]);

        SettlementTask::new(AuctionSettings::default())
            .run(&context)
            .await
            .unwrap();

        match context.res.get().unwrap() {
            BidResponseState::Bid(response) => {
                assert_eq!(response.cur, "USD");
                assert_eq!(response.seatbid.len(), 1);
                assert_eq!(response.seatbid[0].seat, "x");
                assert_eq!(response.seatbid[0].bid[0].price, 2.5);
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_second_price_clears_at_runner_up() {
        let context = context_with_outcomes(
            2,
            vec![
                ("x", vec![typed_bid("b1", 2.5)]),
                ("y", vec![typed_bid("b2", 1.8)]),
            ],
        );

        SettlementTask::new(AuctionSettings::default())
            .run(&context)
            .await
            .unwrap();

        match context.res.get().unwrap() {
            BidResponseState::Bid(response) => {
                // One winner per impression; the loser is dropped
                let all_bids: usize = response.seatbid.iter().map(|s| s.bid.len()).sum();
                assert_eq!(all_bids, 1);
                assert_eq!(response.seatbid[0].seat, "x");
                assert_eq!(response.seatbid[0].bid[0].price, 1.8);
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_second_price_respects_floor() {
        let context = context_with_outcomes(
            2,
            vec![
                ("x", vec![typed_bid("b1", 2.5)]),
                ("y", vec![typed_bid("b2", 0.2)]),
            ],
        );

        SettlementTask::new(AuctionSettings::default())
            .run(&context)
            .await
            .unwrap();

        match context.res.get().unwrap() {
            BidResponseState::Bid(response) => {
                // Runner-up is below the 1.0 floor, so the floor clears
                assert_eq!(response.seatbid[0].bid[0].price, 1.0);
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_lone_bid_clears_at_floor_by_default() {
        let context = context_with_outcomes(2, vec![("x", vec![typed_bid("b1", 2.5)])]);

        SettlementTask::new(AuctionSettings::default())
            .run(&context)
            .await
            .unwrap();

        match context.res.get().unwrap() {
            BidResponseState::Bid(response) => {
                assert_eq!(response.seatbid[0].bid[0].price, 1.0);
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_single_bid_first_price_flag() {
        let context = context_with_outcomes(2, vec![("x", vec![typed_bid("b1", 2.5)])]);

        let mut settings = AuctionSettings::default();
        settings.single_bid_first_price = true;

        SettlementTask::new(settings).run(&context).await.unwrap();

        match context.res.get().unwrap() {
            BidResponseState::Bid(response) => {
                assert_eq!(response.seatbid[0].bid[0].price, 2.5);
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_tie_breaks_to_first_callout() {
        let context = context_with_outcomes(
            1,
            vec![
                ("beta", vec![typed_bid("b2", 2.5)]),
                ("alpha", vec![typed_bid("b1", 2.5)]),
            ],
        );

        SettlementTask::new(AuctionSettings::default())
            .run(&context)
            .await
            .unwrap();

        match context.res.get().unwrap() {
            BidResponseState::Bid(response) => {
                // Callouts run in sorted code order, so alpha is seen
                // first and keeps the tie
                assert_eq!(response.seatbid[0].seat, "alpha");
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[actix_rt::test]
    async fn test_no_bids_yields_plain_nobid() {
        let context = context_with_outcomes(1, vec![("x", vec![])]);

        SettlementTask::new(AuctionSettings::default())
            .run(&context)
            .await
            .unwrap();

        assert!(matches!(
            context.res.get(),
            Some(BidResponseState::NoBid { .. })
        ));
    }

    #[actix_rt::test]
    async fn test_debug_mode_keeps_losers() {
        let context = context_with_outcomes(
            1,
            vec![
                ("x", vec![typed_bid("b1", 2.5)]),
                ("y", vec![typed_bid("b2", 1.8)]),
            ],
        );

        let mut settings = AuctionSettings::default();
        settings.debug = true;

        SettlementTask::new(settings).run(&context).await.unwrap();

        match context.res.get().unwrap() {
            BidResponseState::Bid(response) => {
                let all_bids: usize = response.seatbid.iter().map(|s| s.bid.len()).sum();
                assert_eq!(all_bids, 2);
            }
            other => panic!("unexpected state {:?}", other),
        }
    }
}
