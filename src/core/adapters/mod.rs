mod adapter;
mod generic;
mod registry;

pub use adapter::{
    BidderAdapter, BidderResponse, ExtraRequestInfo, MediaType, RequestData, ResponseData, TypedBid,
};
pub use generic::OpenRtbJsonAdapter;
pub use registry::{AdapterRegistry, RegisteredBidder};
