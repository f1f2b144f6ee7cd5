use crate::core::adapters::adapter::{
    BidderAdapter, BidderResponse, ExtraRequestInfo, MediaType, RequestData, ResponseData, TypedBid,
};
use crate::core::openrtb::{BidRequest, BidResponse};
use anyhow::anyhow;

/// Generic OpenRTB 2.5 JSON transport. Most demand partners speak
/// this directly; anything exotic lives in its own adapter crate
/// outside this tree.
pub struct OpenRtbJsonAdapter {
    endpoint: String,
}

impl OpenRtbJsonAdapter {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
        }
    }

    /// Media type claim: explicit `mtype` wins, otherwise fall back to
    /// the shape of the impression the bid references
    fn claim_media_type(bid: &crate::core::openrtb::Bid, request: &BidRequest) -> MediaType {
        match bid.mtype {
            Some(1) => return MediaType::Banner,
            Some(2) => return MediaType::Video,
            Some(3) => return MediaType::Audio,
            Some(4) => return MediaType::Native,
            _ => {}
        }

        if let Some(imp) = request.imp_by_id(&bid.impid) {
            if imp.video.is_some() {
                return MediaType::Video;
            }
            if imp.native.is_some() {
                return MediaType::Native;
            }
            if imp.audio.is_some() {
                return MediaType::Audio;
            }
        }

        MediaType::Banner
    }
}

impl BidderAdapter for OpenRtbJsonAdapter {
    fn make_requests(
        &self,
        request: &BidRequest,
        _extra: &ExtraRequestInfo,
    ) -> (Vec<RequestData>, Vec<anyhow::Error>) {
        match serde_json::to_vec(request) {
            Ok(body) => (vec![RequestData::post_json(&self.endpoint, body)], vec![]),
            Err(e) => (vec![], vec![anyhow!("request encode failed: {}", e)]),
        }
    }

    fn make_bids(
        &self,
        request: &BidRequest,
        response: &ResponseData,
    ) -> (Option<BidderResponse>, Vec<anyhow::Error>) {
        if response.status == 204 || response.body.is_empty() {
            return (None, vec![]);
        }

        if response.status != 200 {
            return (
                None,
                vec![anyhow!("unexpected bidder status {}", response.status)],
            );
        }

        let parsed: BidResponse = match serde_json::from_slice(&response.body) {
            Ok(parsed) => parsed,
            Err(e) => return (None, vec![anyhow!("response decode failed: {}", e)]),
        };

        let mut bids = Vec::new();
        for seatbid in parsed.seatbid {
            for bid in seatbid.bid {
                let media_type = Self::claim_media_type(&bid, request);
                bids.push(TypedBid { bid, media_type });
            }
        }

        // The id is passed through as-is; echoing the request id is a
        // response-level validation concern, not a transport one
        (
            Some(BidderResponse {
                id: parsed.id,
                currency: parsed.cur,
                bids,
            }),
            vec![],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::openrtb::request::{Imp, Video};
    use bytes::Bytes;

    fn video_request() -> BidRequest {
        BidRequest {
            id: "r1".into(),
            imp: vec![Imp {
                id: "imp1".into(),
                video: Some(Video::default()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_make_requests_posts_json() {
        let adapter = OpenRtbJsonAdapter::new("https://dsp.example/bid");
        let (requests, errors) = adapter.make_requests(&video_request(), &Default::default());

        assert!(errors.is_empty());
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].uri, "https://dsp.example/bid");
        assert!(
            requests[0]
                .headers
                .iter()
                .any(|(k, v)| k == "content-type" && v == "application/json")
        );

        let body: BidRequest = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body.id, "r1");
    }

    #[test]
    fn test_make_bids_no_content_is_no_bid() {
        let adapter = OpenRtbJsonAdapter::new("https://dsp.example/bid");
        let (response, errors) = adapter.make_bids(
            &video_request(),
            &ResponseData {
                status: 204,
                body: Bytes::new(),
            },
        );

        assert!(response.is_none());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_make_bids_parses_typed_bids() {
        let adapter = OpenRtbJsonAdapter::new("https://dsp.example/bid");
        let body = r#"{"id":"r1","cur":"USD","seatbid":[{"seat":"x","bid":[{"id":"b1","impid":"imp1","price":2.5}]}]}"#;

        let (response, errors) = adapter.make_bids(
            &video_request(),
            &ResponseData {
                status: 200,
                body: Bytes::from(body),
            },
        );

        assert!(errors.is_empty());
        let response = response.unwrap();
        assert_eq!(response.currency, "USD");
        assert_eq!(response.bids.len(), 1);
        assert_eq!(response.bids[0].media_type, MediaType::Video);
    }

    #[test]
    fn test_response_id_passed_through_verbatim() {
        let adapter = OpenRtbJsonAdapter::new("https://dsp.example/bid");
        let body = r#"{"id":"other","seatbid":[{"bid":[{"id":"b1","impid":"imp1","price":1.0}]}]}"#;

        let (response, errors) = adapter.make_bids(
            &video_request(),
            &ResponseData {
                status: 200,
                body: Bytes::from(body),
            },
        );

        // Mismatch rejection belongs to the engine's response-level
        // validation, not the adapter
        assert!(errors.is_empty());
        assert_eq!(response.unwrap().id, "other");
    }

    #[test]
    fn test_garbage_body_is_error_not_panic() {
        let adapter = OpenRtbJsonAdapter::new("https://dsp.example/bid");
        let (response, errors) = adapter.make_bids(
            &video_request(),
            &ResponseData {
                status: 200,
                body: Bytes::from("not json"),
            },
        );

        assert!(response.is_none());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_mtype_claim_overrides_imp_shape() {
        let adapter = OpenRtbJsonAdapter::new("https://dsp.example/bid");
        let body = r#"{"id":"r1","seatbid":[{"bid":[{"id":"b1","impid":"imp1","price":1.0,"mtype":1}]}]}"#;

        let (response, _) = adapter.make_bids(
            &video_request(),
            &ResponseData {
                status: 200,
                body: Bytes::from(body),
            },
        );

        assert_eq!(response.unwrap().bids[0].media_type, MediaType::Banner);
    }
}
