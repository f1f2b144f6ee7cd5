pub mod handlers;
mod server;
pub mod state;

pub use server::{Server, ServerConfig};

use crate::server::state::AppState;
use actix_web::web;

/// Wire every endpoint onto the actix service config. The state data
/// slot must be registered by the caller before this runs.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/openrtb2/auction",
        web::post().to(handlers::auction::openrtb_auction),
    )
    .route("/video/openrtb", web::post().to(handlers::video::video_openrtb))
    .route("/video/vast", web::get().to(handlers::video::video_vast))
    .route("/cache", web::post().to(handlers::cache::cache_put))
    .route("/cache", web::get().to(handlers::cache::cache_get))
    .route("/cache", web::method(actix_web::http::Method::OPTIONS).to(handlers::cache::cache_options))
    .route("/api/v1/video/event", web::get().to(handlers::events::event_pixel))
    .route("/api/v1/video/event", web::post().to(handlers::events::event_post))
    .route("/pause-ad", web::post().to(handlers::pause::pause_ad))
    .route("/cookie_sync", web::post().to(handlers::sync::cookie_sync))
    .route("/setuid", web::get().to(handlers::sync::setuid))
    .route("/setuid", web::post().to(handlers::sync::setuid))
    .route("/status", web::get().to(handlers::status::status))
    .route("/health", web::get().to(handlers::status::status));

    for event in [
        "start", "complete", "quartile", "click", "pause", "resume", "error",
    ] {
        cfg.route(
            &format!("/api/v1/video/{event}"),
            web::get().to(handlers::events::event_pixel),
        );
        cfg.route(
            &format!("/api/v1/video/{event}"),
            web::post().to(handlers::events::event_post),
        );
    }
}

/// Build the shared handler state from startup products
pub fn build_app_state(
    context: &crate::app::lifecycle::context::StartupContext,
) -> anyhow::Result<AppState> {
    use anyhow::anyhow;

    let config = context
        .config
        .get()
        .ok_or_else(|| anyhow!("config missing building app state"))?
        .clone();

    Ok(AppState {
        trusted_proxies: AppState::parse_trusted_proxies(&config.trusted_proxies),
        auth: context
            .auth
            .get()
            .ok_or_else(|| anyhow!("auth validator missing"))?
            .clone(),
        auction_pipeline: context
            .auction_pipeline
            .get()
            .ok_or_else(|| anyhow!("auction pipeline missing"))?
            .clone(),
        event_pipeline: context
            .event_pipeline
            .get()
            .ok_or_else(|| anyhow!("event pipeline missing"))?
            .clone(),
        sync_out_pipeline: context
            .sync_out_pipeline
            .get()
            .ok_or_else(|| anyhow!("sync-out pipeline missing"))?
            .clone(),
        sync_in_pipeline: context
            .sync_in_pipeline
            .get()
            .ok_or_else(|| anyhow!("sync-in pipeline missing"))?
            .clone(),
        adcache: context
            .adcache
            .get()
            .ok_or_else(|| anyhow!("ad cache missing"))?
            .clone(),
        events: context
            .events
            .get()
            .ok_or_else(|| anyhow!("event url builder missing"))?
            .clone(),
        config,
    })
}
