pub mod request;
pub mod response;
pub mod validation;

pub use request::{App, Banner, BidRequest, Deal, Device, Format, Geo, Imp, Native, Pmp, Publisher as RtbPublisher, Regs, RegsExt, Site, Source, User, Video};
pub use response::{Bid, BidBuilder, BidResponse, BidResponseBuilder, SeatBid, SeatBidBuilder};
