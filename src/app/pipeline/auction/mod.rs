pub mod context;
pub mod pipeline;
pub mod tasks;
pub mod validation;

pub use context::{AuctionContext, BidResponseState};
pub use pipeline::build_auction_pipeline;
