use crate::app::pipeline::events::context::VideoEventContext;
use crate::core::models::events::{VideoEvent, VideoEventKind};
use crate::core::observability::counters;
use crate::pipeline::BlockingTask;
use anyhow::{Error, anyhow, bail};
use std::str::FromStr;
use tracing::debug;

/// Extracts a structured [`VideoEvent`] from whatever shape the
/// player sent: route-pinned kind, `event` query param, or JSON body
pub struct ExtractEventTask;

impl BlockingTask<VideoEventContext, Error> for ExtractEventTask {
    fn run(&self, context: &VideoEventContext) -> Result<(), Error> {
        let mut event = match &context.body {
            Some(body) if !body.is_empty() => {
                serde_json::from_slice::<VideoEvent>(body)
                    .map_err(|e| anyhow!("malformed event body: {}", e))?
            }
            _ => {
                let kind = context
                    .path_kind
                    .or_else(|| {
                        context
                            .query
                            .get("event")
                            .and_then(|raw| VideoEventKind::from_str(raw).ok())
                    })
                    .ok_or_else(|| anyhow!("event kind missing"))?;

                VideoEvent::new(kind)
            }
        };

        // The route wins over whatever the body claims
        if let Some(kind) = context.path_kind {
            event.kind = kind;
        }

        if event.auction_id.is_none() {
            event.auction_id = context.query.get("auction").cloned();
        }
        if event.imp_id.is_none() {
            event.imp_id = context.query.get("imp").cloned();
        }
        if event.bidder.is_none() {
            event.bidder = context.query.get("bidder").cloned();
        }
        if event.ts == 0 {
            event.ts = chrono::Utc::now().timestamp_millis() as u64;
        }

        debug!("Extracted video event {:?}", event.kind);

        match context.event.set(event) {
            Ok(_) => Ok(()),
            Err(_) => bail!("event already set on context"),
        }
    }
}

/// Counts the event; runs for every call, even ones that carry no
/// auction correlation
pub struct RecordEventTask;

impl BlockingTask<VideoEventContext, Error> for RecordEventTask {
    fn run(&self, context: &VideoEventContext) -> Result<(), Error> {
        let event = context
            .event
            .get()
            .ok_or_else(|| anyhow!("event missing on context, cant record"))?;

        counters::record_video_event(&event.kind.to_string());

        debug!(
            "Recorded video event {} auction={:?} bidder={:?}",
            event.kind, event.auction_id, event.bidder
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_extract_from_route_kind() {
        let context = VideoEventContext::new(
            Some(VideoEventKind::Start),
            HashMap::from([("auction".to_string(), "a1".to_string())]),
            None,
        );

        ExtractEventTask.run(&context).unwrap();

        let event = context.event.get().unwrap();
        assert_eq!(event.kind, VideoEventKind::Start);
        assert_eq!(event.auction_id.as_deref(), Some("a1"));
        assert!(event.ts > 0);
    }

    #[test]
    fn test_extract_from_query_param() {
        let context = VideoEventContext::new(
            None,
            HashMap::from([("event".to_string(), "midpoint".to_string())]),
            None,
        );

        ExtractEventTask.run(&context).unwrap();
        assert_eq!(context.event.get().unwrap().kind, VideoEventKind::Midpoint);
    }

    #[test]
    fn test_extract_from_json_body() {
        let body = bytes::Bytes::from(
            r#"{"kind": "complete", "auction_id": "a9", "bidder": "x"}"#,
        );
        let context = VideoEventContext::new(None, HashMap::new(), Some(body));

        ExtractEventTask.run(&context).unwrap();

        let event = context.event.get().unwrap();
        assert_eq!(event.kind, VideoEventKind::Complete);
        assert_eq!(event.bidder.as_deref(), Some("x"));
    }

    #[test]
    fn test_missing_kind_is_error() {
        let context = VideoEventContext::new(None, HashMap::new(), None);
        assert!(ExtractEventTask.run(&context).is_err());
    }

    #[test]
    fn test_record_requires_extraction() {
        let context = VideoEventContext::new(None, HashMap::new(), None);
        assert!(RecordEventTask.run(&context).is_err());
    }
}
