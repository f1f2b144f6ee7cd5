use crate::app::config::PublisherSettings;
use crate::app::pipeline::auction::context::{AuctionContext, BidResponseState};
use crate::core::managers::PublisherManager;
use crate::core::models::publisher::Publisher;
use crate::core::spec::nobidreasons;
use crate::error::VexError;
use crate::pipeline::AsyncTask;
use anyhow::{Error, anyhow, bail};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{Instrument, debug};

/// Resolves and validates the selling publisher before any expensive
/// work runs. Applies the multi-tier lookup, the API-key binding
/// check, and optional domain validation.
pub struct PubResolveTask {
    manager: Arc<PublisherManager>,
    settings: PublisherSettings,
}

impl PubResolveTask {
    pub fn new(manager: Arc<PublisherManager>, settings: PublisherSettings) -> Self {
        Self { manager, settings }
    }

    fn no_seller(&self, context: &AuctionContext, nbr: u32, desc: &'static str) -> Error {
        let state = BidResponseState::NoBidReason {
            reqid: context.original_auction_id.clone(),
            nbr,
            desc: Some(desc),
        };

        if context.res.set(state).is_err() {
            return anyhow!("response state already assigned during publisher resolve");
        }

        anyhow!("publisher rejected: {}", desc)
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        if !self.settings.enabled {
            return Ok(());
        }

        let (publisher_id, domain) = {
            let req = context.req.read();
            (
                req.publisher_id().map(str::to_string),
                req.channel_domain().map(str::to_string),
            )
        };

        let publisher_id = match publisher_id.or_else(|| context.auth_publisher_id.clone()) {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                if self.settings.allow_unregistered {
                    debug!("Request carries no publisher id, accepting as unregistered");
                    context
                        .publisher
                        .set(Arc::new(Publisher::unregistered("unknown")))
                        .map_err(|_| anyhow!("publisher already set"))?;
                    return Ok(());
                }

                return Err(self.no_seller(
                    context,
                    nobidreasons::UNKNOWN_SELLER,
                    "Missing publisher id",
                ));
            }
        };

        // An authenticated key is bound to one publisher; a body
        // claiming another is not honored
        if let Some(bound) = &context.auth_publisher_id {
            if bound != &publisher_id {
                context
                    .reject
                    .set(VexError::PublisherBlocked(
                        "api key not valid for publisher".into(),
                    ))
                    .ok();
                bail!(
                    "publisher {} does not match key binding {}",
                    publisher_id,
                    bound
                );
            }
        }

        let publisher = match self.manager.resolve(&publisher_id).await {
            Some(publisher) => publisher,
            None => {
                if self.settings.allow_unregistered {
                    Arc::new(Publisher::unregistered(&publisher_id))
                } else {
                    return Err(self.no_seller(
                        context,
                        nobidreasons::UNKNOWN_SELLER,
                        "Unknown publisher id",
                    ));
                }
            }
        };

        if !publisher.enabled {
            return Err(self.no_seller(
                context,
                nobidreasons::SELLER_DISABLED,
                "Publisher disabled",
            ));
        }

        if self.settings.validate_domain && !publisher.allowed_domains.is_empty() {
            let allowed = domain
                .as_deref()
                .map(|d| publisher.domain_allowed(d))
                .unwrap_or(false);

            if !allowed {
                context
                    .reject
                    .set(VexError::PublisherBlocked(
                        "domain not registered for publisher".into(),
                    ))
                    .ok();
                bail!(
                    "domain {:?} not allowed for publisher {}",
                    domain,
                    publisher_id
                );
            }
        }

        debug!("Resolved publisher {}", publisher_id);

        context
            .publisher
            .set(publisher)
            .map_err(|_| anyhow!("publisher already set on context"))?;

        Ok(())
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for PubResolveTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = crate::child_span_info!("pub_resolve_task");

        self.run0(context).instrument(span).await
    }
}
