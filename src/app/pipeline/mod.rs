pub mod auction;
pub mod events;
pub mod syncing;
