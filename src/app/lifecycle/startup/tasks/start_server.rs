use crate::app::lifecycle::context::StartupContext;
use crate::pipeline::AsyncTask;
use crate::server::{Server, ServerConfig, build_app_state, configure_routes};
use actix_web::web;
use anyhow::{Error, anyhow};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub(crate) struct StartServerTask;

#[async_trait]
impl AsyncTask<StartupContext, anyhow::Error> for StartServerTask {
    async fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = context
            .config
            .get()
            .ok_or_else(|| anyhow!("config missing during start server task"))?;

        let server_cfg = ServerConfig {
            http_port: config.server.http_port,
            tcp_backlog: config.server.backlog,
            max_conns: config.server.max_conns,
            threads: config.server.workers,
        };

        let state = Arc::new(build_app_state(context)?);

        let server = Server::listen(server_cfg, move |cfg| {
            cfg.app_data(web::Data::from(Arc::clone(&state)));
            configure_routes(cfg);
        })
        .await
        .map_err(|e| anyhow!("failed to bind listener: {}", e))?;

        context
            .server
            .set(server)
            .map_err(|_| anyhow!("could not set server on context"))?;

        info!(
            "Started http server on port {}, ready for requests",
            config.server.http_port
        );

        Ok(())
    }
}
