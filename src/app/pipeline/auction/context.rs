use crate::core::adapters::{RegisteredBidder, TypedBid};
use crate::core::admission::PrivacyContext;
use crate::core::models::publisher::Publisher;
use crate::core::openrtb::{BidRequest, BidResponse};
use crate::error::VexError;
use parking_lot::{Mutex, RwLock};
use std::net::IpAddr;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Final outcome of evaluating a request
#[derive(Debug, Clone)]
pub enum BidResponseState {
    /// One or more valid seat bids are present
    Bid(BidResponse),
    /// No bids; served as HTTP 204 on the JSON endpoint
    NoBid { desc: Option<&'static str> },
    /// No bids with a structured reason code, served HTTP 200 with an
    /// nbr body. See [`crate::core::spec::nobidreasons`].
    NoBidReason {
        reqid: String,
        nbr: u32,
        desc: Option<&'static str>,
    },
}

impl From<BidResponseState> for Option<BidResponse> {
    fn from(value: BidResponseState) -> Self {
        match value {
            BidResponseState::Bid(response) => Some(response),
            BidResponseState::NoBidReason { reqid, nbr, .. } => Some(BidResponse {
                id: reqid,
                nbr: Some(nbr),
                ..Default::default()
            }),
            BidResponseState::NoBid { .. } => None,
        }
    }
}

/// Why a callout never reached the wire
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalloutSkipReason {
    CircuitOpen,
    QpsThrottled,
}

/// A non-fatal bidder-level problem, accumulated rather than surfaced
#[derive(Debug)]
pub struct BidderError {
    pub bidder: String,
    pub kind: &'static str,
    pub message: String,
}

/// A structured per-bid rejection; never aborts the auction
#[derive(Debug, Clone, PartialEq)]
pub struct BidValidationError {
    pub bidder_code: String,
    pub bid_id: String,
    pub imp_id: String,
    pub reason: &'static str,
}

/// Everything one bidder's fan-out task produced: validated bids with
/// prices already normalised to the response currency, plus the bids
/// it lost to validation
#[derive(Debug, Default)]
pub struct CalloutOutcome {
    pub bids: Vec<TypedBid>,
    pub rejections: Vec<BidValidationError>,
}

/// Per-bidder slot created before fan-out. Results land in write-once
/// cells, so a late task completing after selection has begun writes
/// into a slot nobody reads again.
pub struct BidderCallout {
    pub bidder: Arc<RegisteredBidder>,
    pub skip_reason: OnceLock<CalloutSkipReason>,
    pub outcome: OnceLock<CalloutOutcome>,
}

impl BidderCallout {
    pub fn new(bidder: Arc<RegisteredBidder>) -> Self {
        Self {
            bidder,
            skip_reason: OnceLock::new(),
            outcome: OnceLock::new(),
        }
    }
}

/// Top level auction context carrying all state for one request
/// pipeline run.
///
/// * `req` uses interior mutability for in-place adaptations such as
///   the privacy scrub
/// * `callouts` is created once by the match stage and only read after
/// * `res` is the final outbound [`BidResponseState`]
/// * `reject` carries an admission rejection that must surface as its
///   HTTP status instead of a no-bid body
pub struct AuctionContext {
    /// Handler route this auction arrived through
    pub source: String,
    pub original_auction_id: String,
    /// Publisher binding derived from API-key auth, when enabled
    pub auth_publisher_id: Option<String>,
    pub client_ip: Option<IpAddr>,
    pub ua: Option<String>,
    pub referer: Option<String>,
    pub started: Instant,
    pub debug: bool,

    pub req: RwLock<BidRequest>,
    pub publisher: OnceLock<Arc<Publisher>>,
    pub privacy: OnceLock<PrivacyContext>,
    pub response_currency: OnceLock<String>,
    pub callouts: OnceLock<Vec<BidderCallout>>,
    pub errors: Mutex<Vec<BidderError>>,
    pub reject: OnceLock<VexError>,
    pub res: OnceLock<BidResponseState>,
}

impl AuctionContext {
    pub fn new(source: &str, req: BidRequest) -> AuctionContext {
        AuctionContext {
            source: source.to_string(),
            original_auction_id: req.id.clone(),
            auth_publisher_id: None,
            client_ip: None,
            ua: None,
            referer: None,
            started: Instant::now(),
            debug: false,
            req: RwLock::new(req),
            publisher: OnceLock::new(),
            privacy: OnceLock::new(),
            response_currency: OnceLock::new(),
            callouts: OnceLock::new(),
            errors: Mutex::new(Vec::new()),
            reject: OnceLock::new(),
            res: OnceLock::new(),
        }
    }

    pub fn push_error(&self, bidder: &str, kind: &'static str, message: String) {
        self.errors.lock().push(BidderError {
            bidder: bidder.to_string(),
            kind,
            message,
        });
    }

    /// Currency every winning price is normalised to: the first
    /// request-allowed currency, defaulting to USD
    pub fn settle_currency(&self) -> String {
        self.response_currency
            .get()
            .cloned()
            .unwrap_or_else(|| "USD".to_string())
    }
}
