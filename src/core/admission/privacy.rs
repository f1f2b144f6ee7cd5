use crate::core::openrtb::BidRequest;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// TCF strings shorter than this cannot carry a valid core segment
pub const MIN_TCF_LENGTH: usize = 20;

const LOG_UA_MAX: usize = 50;

/// Privacy facts derived once per request and attached to context.
/// Downstream components consult [`PrivacyContext::pii_permitted`]
/// before collecting or forwarding anything identifying.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PrivacyContext {
    pub gdpr_applies: bool,
    pub gdpr_consented: bool,
    pub ccpa_opt_out: bool,
    pub coppa: bool,
    pub consent_string: Option<String>,
}

impl PrivacyContext {
    /// PII may be collected only when GDPR consent covers it, CCPA has
    /// not opted out, and the request is not COPPA-scoped
    pub fn pii_permitted(&self) -> bool {
        (!self.gdpr_applies || self.gdpr_consented) && !self.ccpa_opt_out && !self.coppa
    }
}

/// Parse regulation signals out of the request
pub fn evaluate(req: &BidRequest) -> PrivacyContext {
    let regs = req.regs.as_ref();

    let gdpr_applies = regs
        .and_then(|r| r.gdpr.or(r.ext.as_ref().and_then(|e| e.gdpr)))
        .map(|flag| flag == 1)
        .unwrap_or(false);

    let consent_string = consent_from_user(req).filter(|s| s.len() >= MIN_TCF_LENGTH);
    let gdpr_consented = consent_string.is_some();

    let ccpa_opt_out = regs
        .and_then(|r| r.ext.as_ref())
        .and_then(|e| e.us_privacy.as_deref())
        .map(us_privacy_opts_out)
        .unwrap_or(false);

    let coppa = regs.and_then(|r| r.coppa).map(|c| c == 1).unwrap_or(false);

    PrivacyContext {
        gdpr_applies,
        gdpr_consented,
        ccpa_opt_out,
        coppa,
        consent_string,
    }
}

fn consent_from_user(req: &BidRequest) -> Option<String> {
    req.user
        .as_ref()
        .and_then(|u| u.ext.as_ref())
        .and_then(|ext| ext.get("consent"))
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// US-privacy strings are four characters; position 3 is the
/// opt-out-of-sale signal
fn us_privacy_opts_out(us_privacy: &str) -> bool {
    us_privacy
        .chars()
        .nth(2)
        .map(|c| c.eq_ignore_ascii_case(&'y'))
        .unwrap_or(false)
}

/// Strip identifying fields before the request is forwarded to
/// bidders. IP and UA become empty strings; precise geo, device ids
/// and user ids are zeroed.
pub fn scrub_request(req: &mut BidRequest) {
    if let Some(device) = req.device.as_mut() {
        if device.ip.is_some() {
            device.ip = Some(String::new());
        }
        if device.ipv6.is_some() {
            device.ipv6 = Some(String::new());
        }
        if device.ua.is_some() {
            device.ua = Some(String::new());
        }
        device.ifa = None;

        if let Some(geo) = device.geo.as_mut() {
            geo.lat = None;
            geo.lon = None;
            geo.zip = None;
        }
    }

    if let Some(user) = req.user.as_mut() {
        user.id = None;
        user.buyeruid = None;
    }
}

/// Log-safe IP: v4 keeps the first three octets, v6 keeps the top 48
/// bits. Unparseable input is dropped entirely rather than logged raw.
pub fn anonymize_ip(ip: &str) -> String {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            let octets = v4.octets();
            format!("{}.{}.{}.0", octets[0], octets[1], octets[2])
        }
        Ok(IpAddr::V6(v6)) => {
            let segments = v6.segments();
            std::net::Ipv6Addr::new(segments[0], segments[1], segments[2], 0, 0, 0, 0, 0)
                .to_string()
        }
        Err(_) => String::new(),
    }
}

/// Log-safe UA, truncated on a char boundary
pub fn truncate_ua(ua: &str) -> String {
    ua.chars().take(LOG_UA_MAX).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::openrtb::request::{Device, Geo, Regs, RegsExt, User};
    use serde_json::json;

    fn request_with_regs(regs: Regs) -> BidRequest {
        BidRequest {
            id: "r1".into(),
            regs: Some(regs),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_regs_means_no_gdpr() {
        let ctx = evaluate(&BidRequest::default());

        assert!(!ctx.gdpr_applies);
        assert!(ctx.pii_permitted());
    }

    #[test]
    fn test_gdpr_without_consent_blocks_pii() {
        let ctx = evaluate(&request_with_regs(Regs {
            gdpr: Some(1),
            ..Default::default()
        }));

        assert!(ctx.gdpr_applies);
        assert!(!ctx.gdpr_consented);
        assert!(!ctx.pii_permitted());
    }

    #[test]
    fn test_gdpr_with_valid_consent_permits_pii() {
        let mut req = request_with_regs(Regs {
            gdpr: Some(1),
            ..Default::default()
        });
        req.user = Some(User {
            ext: Some(json!({"consent": "CPc8a1JPc8a1JAKAaAENCt"})),
            ..Default::default()
        });

        let ctx = evaluate(&req);

        assert!(ctx.gdpr_consented);
        assert!(ctx.pii_permitted());
    }

    #[test]
    fn test_short_consent_string_invalid() {
        let mut req = request_with_regs(Regs {
            gdpr: Some(1),
            ..Default::default()
        });
        req.user = Some(User {
            ext: Some(json!({"consent": "short"})),
            ..Default::default()
        });

        let ctx = evaluate(&req);

        assert!(!ctx.gdpr_consented);
        assert!(ctx.consent_string.is_none());
    }

    #[test]
    fn test_gdpr_flag_in_ext_location() {
        let ctx = evaluate(&request_with_regs(Regs {
            ext: Some(RegsExt {
                gdpr: Some(1),
                us_privacy: None,
            }),
            ..Default::default()
        }));

        assert!(ctx.gdpr_applies);
    }

    #[test]
    fn test_ccpa_opt_out() {
        let ctx = evaluate(&request_with_regs(Regs {
            ext: Some(RegsExt {
                gdpr: None,
                us_privacy: Some("1YYN".into()),
            }),
            ..Default::default()
        }));

        assert!(ctx.ccpa_opt_out);
        assert!(!ctx.pii_permitted());

        let ctx = evaluate(&request_with_regs(Regs {
            ext: Some(RegsExt {
                gdpr: None,
                us_privacy: Some("1YNN".into()),
            }),
            ..Default::default()
        }));

        assert!(!ctx.ccpa_opt_out);
    }

    #[test]
    fn test_coppa_blocks_pii() {
        let ctx = evaluate(&request_with_regs(Regs {
            coppa: Some(1),
            ..Default::default()
        }));

        assert!(ctx.coppa);
        assert!(!ctx.pii_permitted());
    }

    #[test]
    fn test_scrub_empties_ip_and_ua() {
        let mut req = BidRequest {
            id: "r1".into(),
            device: Some(Device {
                ua: Some("Mozilla/5.0".into()),
                ip: Some("203.0.113.7".into()),
                ipv6: Some("2001:db8::1".into()),
                ifa: Some("ifa-123".into()),
                geo: Some(Geo {
                    lat: Some(52.52),
                    lon: Some(13.40),
                    country: Some("DEU".into()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            user: Some(User {
                id: Some("u1".into()),
                buyeruid: Some("b1".into()),
                ..Default::default()
            }),
            ..Default::default()
        };

        scrub_request(&mut req);

        let device = req.device.unwrap();
        assert_eq!(device.ip.as_deref(), Some(""));
        assert_eq!(device.ipv6.as_deref(), Some(""));
        assert_eq!(device.ua.as_deref(), Some(""));
        assert!(device.ifa.is_none());

        let geo = device.geo.unwrap();
        assert!(geo.lat.is_none());
        assert!(geo.lon.is_none());
        // Coarse location survives
        assert_eq!(geo.country.as_deref(), Some("DEU"));

        let user = req.user.unwrap();
        assert!(user.id.is_none());
        assert!(user.buyeruid.is_none());
    }

    #[test]
    fn test_anonymize_ipv4_zeroes_last_octet() {
        assert_eq!(anonymize_ip("203.0.113.77"), "203.0.113.0");
    }

    #[test]
    fn test_anonymize_ipv6_keeps_top_48_bits() {
        assert_eq!(
            anonymize_ip("2001:db8:abcd:1234:5678:9abc:def0:1"),
            "2001:db8:abcd::"
        );
    }

    #[test]
    fn test_anonymize_garbage_is_empty() {
        assert_eq!(anonymize_ip("not-an-ip"), "");
    }

    #[test]
    fn test_truncate_ua() {
        let long = "x".repeat(200);
        assert_eq!(truncate_ua(&long).len(), 50);
        assert_eq!(truncate_ua("short"), "short");
    }
}
