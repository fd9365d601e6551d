//! registryd - OnionMesh node registry daemon
//!
//! Keeps the directory of relay ids and public keys that senders build
//! circuits from.

use clap::Parser;
use registryd::config::Config;
use registryd::server::Server;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_logging(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("registryd=info"));
    let registry = tracing_subscriber::registry().with(filter);
    if config.log_format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse configuration
    let config = Config::parse();
    init_logging(&config);

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    info!(
        "registryd v{} - OnionMesh Node Registry",
        env!("CARGO_PKG_VERSION")
    );

    let server = Arc::new(Server::new(config));

    let signal_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_server.shutdown();
    });

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
