//! OpenRTB substitution macros (spec section 4.4)
//!
//! The exchange never expands these itself. `${AUCTION_PRICE}` in
//! win-notice and error URLs is left intact for the video player or
//! downstream server to substitute.

pub const AUCTION_ID: &str = "${AUCTION_ID}";
pub const AUCTION_BID_ID: &str = "${AUCTION_BID_ID}";
pub const AUCTION_IMP_ID: &str = "${AUCTION_IMP_ID}";
pub const AUCTION_SEAT_ID: &str = "${AUCTION_SEAT_ID}";
pub const AUCTION_AD_ID: &str = "${AUCTION_AD_ID}";
pub const AUCTION_PRICE: &str = "${AUCTION_PRICE}";
pub const AUCTION_CURRENCY: &str = "${AUCTION_CURRENCY}";
pub const AUCTION_LOSS: &str = "${AUCTION_LOSS}";
