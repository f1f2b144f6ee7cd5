use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// OpenRTB 2.5 bid response
#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[builder(default)]
pub struct BidResponse {
    /// Mirrors the bid request id
    pub id: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seatbid: Vec<SeatBid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidid: Option<String>,

    /// Bid currency, ISO-4217. Empty is interpreted as USD.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cur: String,

    /// No-bid reason code, see [`crate::core::spec::nobidreasons`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbr: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

/// A group of bids from a single buyer seat
#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[builder(default)]
pub struct SeatBid {
    #[serde(default)]
    pub bid: Vec<Bid>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub seat: String,

    /// 1 = impressions must be won or lost as a group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Builder)]
#[builder(default)]
pub struct Bid {
    pub id: String,

    /// The impression this bid applies to
    pub impid: String,

    /// Bid price in CPM
    pub price: f64,

    /// Win notice URL. May carry `${AUCTION_PRICE}` which the exchange
    /// never expands.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nurl: Option<String>,

    /// Billing notice URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub burl: Option<String>,

    /// Loss notice URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lurl: Option<String>,

    /// Ad markup; XML for video, HTML for display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adm: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub adid: Option<String>,

    /// Advertiser domains for block-list checking
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub adomain: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iurl: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub crid: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cat: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attr: Vec<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<i32>,

    /// Video protocol of the markup, see AdCOM list 5.8
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<u32>,

    /// Creative media type: 1 banner, 2 video, 3 audio, 4 native
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtype: Option<u32>,

    /// Creative duration in seconds for video/audio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dur: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dealid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let bid = BidBuilder::default()
            .id("b1".to_string())
            .impid("imp1".to_string())
            .price(2.5)
            .build()
            .unwrap();

        assert_eq!(bid.id, "b1");
        assert_eq!(bid.price, 2.5);
        assert!(bid.adm.is_none());
        assert!(bid.adomain.is_empty());
    }

    #[test]
    fn test_empty_cur_not_serialized() {
        let res = BidResponseBuilder::default()
            .id("r1".to_string())
            .build()
            .unwrap();

        let json = serde_json::to_string(&res).unwrap();
        assert!(!json.contains("\"cur\""));
        assert!(!json.contains("seatbid"));
    }

    #[test]
    fn test_response_roundtrip() {
        let res = BidResponseBuilder::default()
            .id("r1".to_string())
            .cur("USD".to_string())
            .seatbid(vec![SeatBidBuilder::default()
                .seat("bidder-x".to_string())
                .bid(vec![BidBuilder::default()
                    .id("b1".to_string())
                    .impid("imp1".to_string())
                    .price(2.5)
                    .adomain(vec!["x.com".to_string()])
                    .build()
                    .unwrap()])
                .build()
                .unwrap()])
            .build()
            .unwrap();

        let json = serde_json::to_string(&res).unwrap();
        let back: BidResponse = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id, "r1");
        assert_eq!(back.seatbid[0].seat, "bidder-x");
        assert_eq!(back.seatbid[0].bid[0].price, 2.5);
    }
}
