use crate::core::openrtb::request::{Banner, BidRequest};
use std::collections::HashSet;

/// Request-level validation per the exchange contract. Failures are
/// terminal for the auction and map to an HTTP 400 / error VAST.
pub fn validate_bid_request(req: &BidRequest) -> Result<(), String> {
    if req.id.trim().is_empty() {
        return Err("missing request id".into());
    }

    if req.imp.is_empty() {
        return Err("request has no impressions".into());
    }

    match (&req.site, &req.app) {
        (Some(_), Some(_)) => return Err("both site and app present".into()),
        (None, None) => return Err("neither site nor app present".into()),
        _ => {}
    }

    let mut seen_ids = HashSet::with_capacity(req.imp.len());

    for imp in &req.imp {
        if imp.id.trim().is_empty() {
            return Err("impression with empty id".into());
        }

        if !seen_ids.insert(imp.id.as_str()) {
            return Err(format!("duplicate impression id {}", imp.id));
        }

        if !imp.has_media_object() {
            return Err(format!("impression {} has no media object", imp.id));
        }

        if let Some(banner) = &imp.banner {
            if let Some(w) = banner.w {
                if w <= 0 {
                    return Err(format!("impression {} banner width not positive", imp.id));
                }
            }
            if let Some(h) = banner.h {
                if h <= 0 {
                    return Err(format!("impression {} banner height not positive", imp.id));
                }
            }
            for f in &banner.format {
                if f.w <= 0 || f.h <= 0 {
                    return Err(format!("impression {} banner format not positive", imp.id));
                }
            }
        }

        if imp.bidfloor < 0.0 || !imp.bidfloor.is_finite() {
            return Err(format!("impression {} bidfloor invalid", imp.id));
        }
    }

    Ok(())
}

/// Whether a bid's dimensions satisfy the banner constraints. With no
/// explicit w/h and no format list, any size is acceptable.
pub fn banner_allows(banner: &Banner, w: Option<i32>, h: Option<i32>) -> bool {
    let constrained = banner.w.is_some() || banner.h.is_some() || !banner.format.is_empty();
    if !constrained {
        return true;
    }

    let (Some(w), Some(h)) = (w, h) else {
        // Constrained placement requires declared bid dimensions
        return false;
    };

    if banner.w == Some(w) && banner.h == Some(h) {
        return true;
    }

    banner.format.iter().any(|f| f.w == w && f.h == h)
}

/// Case-insensitive intersection test against the request block list
pub fn adomain_blocked(badv: &[String], adomain: &[String]) -> bool {
    if badv.is_empty() || adomain.is_empty() {
        return false;
    }

    adomain.iter().any(|domain| {
        badv.iter()
            .any(|blocked| blocked.eq_ignore_ascii_case(domain))
    })
}
