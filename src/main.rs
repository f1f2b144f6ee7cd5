mod app;
mod core;
mod error;
mod macros;
mod pipeline;
mod server;

use crate::app::context::StartupContext;
use crate::app::shutdown::build_shutdown_pipeline;
use crate::app::startup::build_start_pipeline;
use actix_web::rt::signal;

#[actix_web::main]
async fn main() {
    let startup_pipeline = build_start_pipeline("vex.yaml".into());
    let startup_ctx = StartupContext::default();

    match startup_pipeline.run(&startup_ctx).await {
        Ok(_) => println!("Startup successful"),
        Err(e) => {
            eprintln!("Startup failed: {:?}", e);
            std::process::exit(1);
        }
    }

    let shutdown_pipeline = build_shutdown_pipeline();

    if let Err(e) = signal::ctrl_c().await {
        eprintln!("Failed to listen for sigint: {}", e);
        std::process::exit(1);
    }

    match shutdown_pipeline.run(&startup_ctx).await {
        Ok(_) => println!("Shutdown successful"),
        Err(e) => {
            eprintln!("Clean shutdown failed: {:?}", e);
            std::process::exit(1);
        }
    }
}
