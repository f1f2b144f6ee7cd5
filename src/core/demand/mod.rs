mod client;

pub use client::DemandClient;
