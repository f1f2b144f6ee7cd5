use crate::core::openrtb::{Bid, BidRequest};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Outbound HTTP request descriptor produced by an adapter
#[derive(Debug, Clone)]
pub struct RequestData {
    pub method: String,
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RequestData {
    pub fn post_json(uri: &str, body: Vec<u8>) -> Self {
        Self {
            method: "POST".to_string(),
            uri: uri.to_string(),
            headers: vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("x-openrtb-version".to_string(), "2.5".to_string()),
            ],
            body,
        }
    }
}

/// Raw HTTP response handed back to the adapter for parsing
#[derive(Debug, Clone)]
pub struct ResponseData {
    pub status: u16,
    pub body: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaType {
    Banner,
    Video,
    Native,
    Audio,
}

/// A bid plus the media type the adapter claims for it. The claim is
/// the primary type signal during validation.
#[derive(Debug, Clone)]
pub struct TypedBid {
    pub bid: Bid,
    pub media_type: MediaType,
}

/// Parsed outcome of one bidder HTTP exchange
#[derive(Debug, Clone, Default)]
pub struct BidderResponse {
    /// The response id as the bidder sent it. Must echo the request
    /// id; the engine rejects the whole response otherwise.
    pub id: String,
    /// Bid currency; empty defaults to USD downstream
    pub currency: String,
    pub bids: Vec<TypedBid>,
}

/// Auxiliary facts adapters may consult when building requests
#[derive(Debug, Clone, Default)]
pub struct ExtraRequestInfo {
    /// Currency the auction will settle in
    pub response_currency: String,
}

/// The two-method integration contract every demand adapter implements.
///
/// Both operations are non-fatal by design: errors accompany, rather
/// than replace, whatever usable output was produced. An empty request
/// list and a `None` response are both valid "no bid" signals.
pub trait BidderAdapter: Send + Sync {
    fn make_requests(
        &self,
        request: &BidRequest,
        extra: &ExtraRequestInfo,
    ) -> (Vec<RequestData>, Vec<anyhow::Error>);

    fn make_bids(
        &self,
        request: &BidRequest,
        response: &ResponseData,
    ) -> (Option<BidderResponse>, Vec<anyhow::Error>);
}
