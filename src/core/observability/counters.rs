use metrics::counter;

// ── Counter names ───────────────────────────────────────────────────────

/// Auctions received, by endpoint and outcome
pub const AUCTIONS_TOTAL: &str = "vex_auctions_total";
/// Bids received from demand, by bidder
pub const BIDS_RECEIVED: &str = "vex_bids_received_total";
/// Bids dropped during validation, by reason
pub const BIDS_REJECTED: &str = "vex_bids_rejected_total";
/// Winning bids returned, by bidder
pub const BIDS_WON: &str = "vex_bids_won_total";
/// Bidder callout failures, by bidder and kind
pub const BIDDER_ERRORS: &str = "vex_bidder_errors_total";
/// Video event pixels/posts received, by kind
pub const VIDEO_EVENTS: &str = "vex_video_events_total";
/// Cookie-sync and setuid calls, by kind and stored flag
pub const USER_SYNCS: &str = "vex_user_syncs_total";

// ── Recording helpers ───────────────────────────────────────────────────

pub fn record_auction(endpoint: &str, outcome: &str) {
    counter!(AUCTIONS_TOTAL, "endpoint" => endpoint.to_string(), "outcome" => outcome.to_string())
        .increment(1);
}

pub fn record_bids_received(bidder: &str, count: usize) {
    counter!(BIDS_RECEIVED, "bidder" => bidder.to_string()).increment(count as u64);
}

pub fn record_bid_rejected(bidder: &str, reason: &str) {
    counter!(BIDS_REJECTED, "bidder" => bidder.to_string(), "reason" => reason.to_string())
        .increment(1);
}

pub fn record_bid_won(bidder: &str) {
    counter!(BIDS_WON, "bidder" => bidder.to_string()).increment(1);
}

pub fn record_bidder_error(bidder: &str, kind: &str) {
    counter!(BIDDER_ERRORS, "bidder" => bidder.to_string(), "kind" => kind.to_string())
        .increment(1);
}

pub fn record_video_event(kind: &str) {
    counter!(VIDEO_EVENTS, "kind" => kind.to_string()).increment(1);
}

pub fn record_user_sync(kind: &str, stored: bool) {
    counter!(USER_SYNCS, "kind" => kind.to_string(), "stored" => stored.to_string()).increment(1);
}
