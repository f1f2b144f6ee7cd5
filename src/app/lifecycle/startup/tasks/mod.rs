pub(crate) mod adcache;
pub(crate) mod admission;
pub(crate) mod config_load;
pub(crate) mod currency;
pub(crate) mod geo_load;
pub(crate) mod managers_load;
pub(crate) mod observability;
pub(crate) mod pipelines;
pub(crate) mod start_server;
pub(crate) mod stores;
