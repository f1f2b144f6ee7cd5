pub mod adapters;
pub mod adcache;
pub mod admission;
pub mod breaker;
pub mod currency;
pub mod demand;
pub mod geo;
pub mod managers;
pub mod models;
pub mod observability;
pub mod openrtb;
pub mod spec;
pub mod stores;
pub mod usersync;
pub mod vast;
