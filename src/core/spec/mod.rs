pub mod auction_macros;
pub mod nobidreasons;
pub mod protocols;
