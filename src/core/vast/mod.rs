pub mod builder;
pub mod model;
pub mod trackers;
pub mod tracking;

pub use builder::{build_vast_response, empty_vast, error_vast};
pub use model::Vast;
pub use trackers::{VastTrackers, VastTrackersBuilder, inject_vast_trackers};
pub use tracking::EventUrlBuilder;
