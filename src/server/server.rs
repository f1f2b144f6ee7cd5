use actix_web::dev::ServerHandle;
use actix_web::middleware::Compress;
use actix_web::{App, HttpServer, rt, web};
use std::time::Duration;

const LISTEN_ADDR: &str = "0.0.0.0";

/// Listener limit options
pub struct ServerConfig {
    pub http_port: u16,
    pub tcp_backlog: Option<u32>,
    pub max_conns: Option<usize>,
    pub threads: Option<usize>,
}

/// Instance of the HTTP server
pub struct Server {
    handle: ServerHandle,
}

impl Server {
    /// Starts a web listener with the provided config and services.
    ///
    /// The server spawns in the background; the caller owns shutdown
    /// hooks and calls [`Server::stop`] for a graceful drain. H2C
    /// upgrades are accepted automatically for clients that ask.
    pub async fn listen<F>(cfg: ServerConfig, configure: F) -> Result<Server, std::io::Error>
    where
        F: Fn(&mut web::ServiceConfig) + Send + Sync + Clone + 'static,
    {
        let app = HttpServer::new(move || {
            App::new()
                .wrap(Compress::default())
                .configure(configure.clone())
        })
        .backlog(cfg.tcp_backlog.unwrap_or(4096))
        .max_connections(cfg.max_conns.unwrap_or(1 << 15))
        .workers(
            cfg.threads
                .unwrap_or(std::thread::available_parallelism()?.get()),
        )
        .client_request_timeout(Duration::from_secs(1))
        .disable_signals()
        .bind_auto_h2c((LISTEN_ADDR, cfg.http_port))?;

        let run = app.run();
        let handle = run.handle();

        rt::spawn(async move {
            let _ = run.await;
        });

        Ok(Self { handle })
    }

    /// Gracefully shutdown the web server
    pub async fn stop(&self) {
        self.handle.stop(true).await
    }
}
