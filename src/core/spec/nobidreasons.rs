use crate::spec_list;

spec_list! {
    /// Unknown error
    UNKNOWN_ERROR = 0 => "Unknown Error",
    /// Technical error on the exchange side
    TECHNICAL_ERROR = 1 => "Technical Error",
    /// Request failed OpenRTB validation
    INVALID_REQUEST = 2 => "Invalid Request",
    /// Traffic identified as a known crawler
    KNOWN_WEB_SPIDER = 3 => "Known Web Spider",
    /// Traffic suspected to be non-human
    SUSPECTED_NON_HUMAN = 4 => "Suspected Non-Human Traffic",
    /// Request originated from a datacenter or proxy IP
    CLOUD_DATACENTER_PROXY = 5 => "Cloud, Data Center, or Proxy IP",
    UNSUPPORTED_DEVICE = 6 => "Unsupported Device",
    BLOCKED_PUBLISHER = 7 => "Blocked Publisher or Site",
    UNMATCHED_USER = 8 => "Unmatched User",

    // 500+ block is exchange specific per the OpenRTB spec

    /// No registered bidders supported the request
    NO_BUYERS_MATCHED = 500 => "No Buyers Matched",
    /// Bidders were called but none returned an acceptable bid
    NO_BIDS_RECEIVED = 501 => "No Bids Received",
    /// The publisher id is unrecognized
    UNKNOWN_SELLER = 502 => "Unknown Seller",
    SELLER_DISABLED = 503 => "Disabled Seller",
    /// All candidate bidders throttled by QPS or circuit breaker
    THROTTLED_DEMAND = 504 => "Throttled All Demand",
    /// The request tmax left no time to run an auction
    INSUFFICIENT_AUCTION_TIME = 505 => "Insufficient Auction Time",
    /// Deadline elapsed before any bidder answered
    AUCTION_TIMEOUT = 506 => "Auction Timeout",
}
