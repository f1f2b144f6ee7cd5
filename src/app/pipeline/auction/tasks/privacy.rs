use crate::app::pipeline::auction::context::AuctionContext;
use crate::core::admission::privacy;
use crate::pipeline::BlockingTask;
use anyhow::{Error, anyhow};
use tracing::debug;

/// Parses regulation signals, attaches the privacy context, and scrubs
/// identifying fields from the request when collection is not
/// permitted. Everything downstream (fan-out included) sees the
/// scrubbed request.
pub struct PrivacyGateTask;

impl BlockingTask<AuctionContext, Error> for PrivacyGateTask {
    fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = crate::child_span_info!(
            "privacy_gate_task",
            gdpr = tracing::field::Empty,
            permitted = tracing::field::Empty
        )
        .entered();

        let evaluated = privacy::evaluate(&context.req.read());
        let permitted = evaluated.pii_permitted();

        span.record("gdpr", evaluated.gdpr_applies);
        span.record("permitted", permitted);

        if !permitted {
            privacy::scrub_request(&mut context.req.write());
            debug!(
                "PII scrubbed: gdpr={} consented={} ccpa_opt_out={} coppa={}",
                evaluated.gdpr_applies,
                evaluated.gdpr_consented,
                evaluated.ccpa_opt_out,
                evaluated.coppa
            );
        }

        context
            .privacy
            .set(evaluated)
            .map_err(|_| anyhow!("privacy context already set"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::openrtb::BidRequest;
    use crate::core::openrtb::request::{Device, Regs};

    fn consentless_gdpr_request() -> BidRequest {
        BidRequest {
            id: "r1".into(),
            regs: Some(Regs {
                gdpr: Some(1),
                ..Default::default()
            }),
            device: Some(Device {
                ua: Some("Mozilla/5.0".into()),
                ip: Some("203.0.113.9".into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_consentless_gdpr_scrubs_request() {
        let context = AuctionContext::new("/openrtb2/auction", consentless_gdpr_request());

        PrivacyGateTask.run(&context).unwrap();

        let privacy = context.privacy.get().unwrap();
        assert!(privacy.gdpr_applies);
        assert!(!privacy.pii_permitted());

        let req = context.req.read();
        let device = req.device.as_ref().unwrap();
        assert_eq!(device.ip.as_deref(), Some(""));
        assert_eq!(device.ua.as_deref(), Some(""));
    }

    #[test]
    fn test_non_gdpr_request_untouched() {
        let context = AuctionContext::new(
            "/openrtb2/auction",
            BidRequest {
                id: "r1".into(),
                device: Some(Device {
                    ip: Some("203.0.113.9".into()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );

        PrivacyGateTask.run(&context).unwrap();

        assert!(context.privacy.get().unwrap().pii_permitted());
        assert_eq!(
            context.req.read().device.as_ref().unwrap().ip.as_deref(),
            Some("203.0.113.9")
        );
    }
}
