mod bidder_match;
pub use bidder_match::BidderMatchTask;

mod callouts;
pub use callouts::BidderCalloutsTask;

mod ivt;
pub use ivt::IvtScoreTask;

mod privacy;
pub use privacy::PrivacyGateTask;

mod pub_resolve;
pub use pub_resolve::PubResolveTask;

mod rate_limit;
pub use rate_limit::RateLimitTask;

mod settlement;
pub use settlement::SettlementTask;

mod validate;
pub use validate::ValidateRequestTask;
