use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_bidfloorcur() -> String {
    "USD".to_string()
}

/// OpenRTB 2.5 bid request. One object per auction opportunity.
///
/// Flags which the JSON spec defines as 0/1 integers are modeled as
/// integer types directly so no serde shimming is needed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BidRequest {
    /// Unique ID of the bid request, provided by the exchange. REQUIRED.
    pub id: String,

    /// Impressions offered. At least one is required.
    #[serde(default)]
    pub imp: Vec<Imp>,

    /// Website context. Mutually exclusive with `app`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<Site>,

    /// Application context. Mutually exclusive with `site`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<App>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,

    /// Auction type: 1 = first price, 2 = second price plus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<u32>,

    /// Maximum time in milliseconds to submit a bid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmax: Option<u64>,

    /// Allowed currencies for bids, ISO-4217 alpha codes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cur: Vec<String>,

    /// Blocked advertiser domains, e.g. "ford.com".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub badv: Vec<String>,

    /// Blocked advertiser categories (IAB content categories).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcat: Vec<String>,

    /// Allowlist of buyer seats allowed to bid.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wseat: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub regs: Option<Regs>,

    /// 1 = test mode, auctions are not billable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

impl BidRequest {
    /// Auction type with the OpenRTB default of second price
    pub fn auction_type(&self) -> u32 {
        self.at.unwrap_or(2)
    }

    pub fn imp_by_id(&self, imp_id: &str) -> Option<&Imp> {
        self.imp.iter().find(|imp| imp.id == imp_id)
    }

    /// Channel domain: site domain for web, bundle for app
    pub fn channel_domain(&self) -> Option<&str> {
        if let Some(site) = &self.site {
            return site.domain.as_deref();
        }

        self.app.as_ref().and_then(|app| app.bundle.as_deref())
    }

    /// Publisher id from whichever channel object is present
    pub fn publisher_id(&self) -> Option<&str> {
        let publisher = match (&self.site, &self.app) {
            (Some(site), _) => site.publisher.as_ref(),
            (None, Some(app)) => app.publisher.as_ref(),
            (None, None) => None,
        };

        publisher.and_then(|p| p.id.as_deref())
    }
}

/// A single impression offered at auction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Imp {
    /// Unique within the request. REQUIRED.
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<Native>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<Audio>,

    /// Minimum bid in CPM, expressed in `bidfloorcur`.
    #[serde(default)]
    pub bidfloor: f64,

    #[serde(default = "default_bidfloorcur")]
    pub bidfloorcur: String,

    /// 1 = the ad is interstitial or full screen
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instl: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagid: Option<String>,

    /// 1 = HTTPS creative assets required
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmp: Option<Pmp>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

impl Imp {
    pub fn has_media_object(&self) -> bool {
        self.banner.is_some() || self.video.is_some() || self.native.is_some() || self.audio.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Banner {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<i32>,

    /// Allowed sizes when more than one is acceptable
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub format: Vec<Format>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mimes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Format {
    pub w: i32,
    pub h: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Video {
    /// Content MIME allowlist, e.g. "video/mp4". REQUIRED.
    #[serde(default)]
    pub mimes: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minduration: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxduration: Option<i32>,

    /// Supported protocols, see AdCOM list 5.8
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub startdelay: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<u32>,

    /// 1 = linear/in-stream, 2 = non-linear/overlay
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linearity: Option<u32>,

    /// 1 = skippable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u8>,

    /// Seconds of play before skip is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipafter: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minbitrate: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxbitrate: Option<i32>,

    /// Supported API frameworks, see AdCOM list 5.6
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api: Vec<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Native {
    /// Request payload complying with the Native Ad Specification
    #[serde(default)]
    pub request: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ver: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api: Vec<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Audio {
    #[serde(default)]
    pub mimes: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minduration: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxduration: Option<i32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minbitrate: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxbitrate: Option<i32>,
}

/// Private marketplace container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pmp {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_auction: Option<u8>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deals: Vec<Deal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,

    #[serde(default)]
    pub bidfloor: f64,

    #[serde(default = "default_bidfloorcur")]
    pub bidfloorcur: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wseat: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Site {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,

    /// Referrer URL that caused navigation to the current page
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cat: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Publisher>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct App {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Platform-specific application identifier, e.g. "com.foo.mygame"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub storeurl: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cat: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Publisher>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Publisher {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Device {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ua: Option<String>,

    /// IPv4 address closest to the device
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,

    /// "Do Not Track" flag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dnt: Option<u8>,

    /// "Limit Ad Tracking" flag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lmt: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub devicetype: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub osv: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ifa: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Geo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,

    /// ISO-3166-1-alpha-3 country code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Buyer-side id, set via cookie sync
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyeruid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Source {
    /// 1 = upstream source makes the final sale decision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fd: Option<u8>,

    /// Transaction id common across participants
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tid: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pchain: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Regs {
    /// 1 = subject to COPPA
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coppa: Option<u8>,

    /// 1 = subject to GDPR (2.6 placement; 2.5 senders use regs.ext.gdpr)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gdpr: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<RegsExt>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegsExt {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gdpr: Option<u8>,

    /// IAB CCPA/US-privacy string, e.g. "1YNN"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub us_privacy: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserializes_minimal_request() {
        let json = r#"{
            "id": "r1",
            "imp": [{"id": "imp1", "video": {"mimes": ["video/mp4"], "minduration": 5, "maxduration": 30}, "bidfloor": 1.5}],
            "site": {"domain": "news.example.com", "publisher": {"id": "pub-1"}},
            "tmax": 500,
            "cur": ["USD"]
        }"#;

        let req: BidRequest = serde_json::from_str(json).unwrap();

        assert_eq!(req.id, "r1");
        assert_eq!(req.imp.len(), 1);
        assert_eq!(req.imp[0].bidfloor, 1.5);
        assert_eq!(req.imp[0].bidfloorcur, "USD");
        assert_eq!(req.auction_type(), 2);
        assert_eq!(req.publisher_id(), Some("pub-1"));
        assert_eq!(req.channel_domain(), Some("news.example.com"));
    }

    #[test]
    fn test_app_bundle_is_channel_domain() {
        let req = BidRequest {
            app: Some(App {
                bundle: Some("com.example.game".into()),
                publisher: Some(Publisher {
                    id: Some("pub-2".into()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        assert_eq!(req.channel_domain(), Some("com.example.game"));
        assert_eq!(req.publisher_id(), Some("pub-2"));
    }

    #[test]
    fn test_serializes_without_empty_fields() {
        let req = BidRequest {
            id: "r1".into(),
            imp: vec![Imp {
                id: "i1".into(),
                banner: Some(Banner::default()),
                ..Default::default()
            }],
            ..Default::default()
        };

        let json = serde_json::to_string(&req).unwrap();

        assert!(!json.contains("badv"));
        assert!(!json.contains("site"));
        assert!(!json.contains("tmax"));
    }

    #[test]
    fn test_gdpr_accepted_in_both_locations() {
        let json = r#"{"id": "r1", "imp": [], "regs": {"gdpr": 1, "ext": {"gdpr": 1, "us_privacy": "1YNN"}}}"#;
        let req: BidRequest = serde_json::from_str(json).unwrap();

        let regs = req.regs.unwrap();
        assert_eq!(regs.gdpr, Some(1));
        assert_eq!(regs.ext.as_ref().unwrap().gdpr, Some(1));
        assert_eq!(regs.ext.unwrap().us_privacy.as_deref(), Some("1YNN"));
    }
}
