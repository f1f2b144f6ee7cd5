use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Video playback events reported by players
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum VideoEventKind {
    Impression,
    Start,
    FirstQuartile,
    Midpoint,
    ThirdQuartile,
    Complete,
    Click,
    Pause,
    Resume,
    Skip,
    Error,
}

/// One tracked playback event, extracted from a pixel GET or an event
/// POST body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoEvent {
    pub kind: VideoEventKind,
    #[serde(default)]
    pub auction_id: Option<String>,
    #[serde(default)]
    pub imp_id: Option<String>,
    #[serde(default)]
    pub bidder: Option<String>,
    /// Millis since epoch, stamped at receipt
    #[serde(default)]
    pub ts: u64,
}

impl VideoEvent {
    pub fn new(kind: VideoEventKind) -> Self {
        Self {
            kind,
            auction_id: None,
            imp_id: None,
            bidder: None,
            ts: chrono::Utc::now().timestamp_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_event_kind_parses_path_segments() {
        assert_eq!(
            VideoEventKind::from_str("start").unwrap(),
            VideoEventKind::Start
        );
        assert_eq!(
            VideoEventKind::from_str("firstQuartile").unwrap(),
            VideoEventKind::FirstQuartile
        );
        assert_eq!(
            VideoEventKind::from_str("COMPLETE").unwrap(),
            VideoEventKind::Complete
        );
        assert!(VideoEventKind::from_str("bogus").is_err());
    }
}
