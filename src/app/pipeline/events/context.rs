use crate::core::models::events::{VideoEvent, VideoEventKind};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Context for one tracked video playback event, fed by either a
/// pixel GET (query params) or an event POST (JSON body)
pub struct VideoEventContext {
    /// Event kind fixed by the route, e.g. `/api/v1/video/start`
    pub path_kind: Option<VideoEventKind>,
    pub query: HashMap<String, String>,
    pub body: Option<Bytes>,
    pub event: OnceLock<VideoEvent>,
}

impl VideoEventContext {
    pub fn new(
        path_kind: Option<VideoEventKind>,
        query: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Self {
        Self {
            path_kind,
            query,
            body,
            event: OnceLock::new(),
        }
    }
}
