use crate::app::pipeline::auction::context::{AuctionContext, BidResponseState};
use crate::core::admission::ivt::{IvtInput, IvtScorer};
use crate::core::admission::{anonymize_ip, truncate_ua};
use crate::core::spec::nobidreasons;
use crate::error::VexError;
use crate::pipeline::BlockingTask;
use anyhow::{Error, bail};
use std::sync::Arc;
use tracing::{debug, info};

/// Invalid-traffic scoring. Runs after the cheap admission stages and
/// before privacy gating; rejection only happens when blocking is
/// explicitly enabled.
pub struct IvtScoreTask {
    scorer: Arc<IvtScorer>,
}

impl IvtScoreTask {
    pub fn new(scorer: Arc<IvtScorer>) -> Self {
        Self { scorer }
    }
}

impl BlockingTask<AuctionContext, Error> for IvtScoreTask {
    fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = crate::child_span_info!(
            "ivt_score_task",
            score = tracing::field::Empty,
            flagged = tracing::field::Empty
        )
        .entered();

        let req = context.req.read();

        let device_ua = req.device.as_ref().and_then(|d| d.ua.as_deref());
        let ua = device_ua.or(context.ua.as_deref());

        let site_ref = req.site.as_ref().and_then(|s| s.referrer.as_deref());
        let referer = context.referer.as_deref().or(site_ref);

        let request_domain = req.channel_domain();

        let device_ip = req
            .device
            .as_ref()
            .and_then(|d| d.ip.as_deref().or(d.ipv6.as_deref()))
            .and_then(|raw| raw.parse().ok());
        let ip = device_ip.or(context.client_ip);

        let verdict = self.scorer.score(&IvtInput {
            ua,
            referer,
            request_domain,
            ip,
        });

        span.record("score", verdict.score);
        span.record("flagged", verdict.flagged);

        if verdict.flagged {
            // Log sites never see raw identifiers
            info!(
                "IVT flagged request score={} reasons={:?} ip={} ua={}",
                verdict.score,
                verdict.reasons,
                ip.map(|ip| anonymize_ip(&ip.to_string())).unwrap_or_default(),
                truncate_ua(ua.unwrap_or_default()),
            );
        } else {
            debug!("IVT score {}", verdict.score);
        }

        if verdict.blocked {
            drop(req);

            context
                .res
                .set(BidResponseState::NoBidReason {
                    reqid: context.original_auction_id.clone(),
                    nbr: nobidreasons::SUSPECTED_NON_HUMAN,
                    desc: Some("Traffic rejected"),
                })
                .ok();
            context.reject.set(VexError::IvtBlocked).ok();

            bail!("request blocked by IVT score {}", verdict.score);
        }

        Ok(())
    }
}
