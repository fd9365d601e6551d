//! userd - OnionMesh user endpoint daemon

use clap::Parser;
use onionmesh_net::{HttpTransport, RegistryClient};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use userd::{Config, Sender, Server};

fn init_logging(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("userd=info"));
    let registry = tracing_subscriber::registry().with(filter);
    if config.log_format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    init_logging(&config);

    let listen = match config.validate().and_then(|_| config.listen_addr()) {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("userd v{} - OnionMesh User", env!("CARGO_PKG_VERSION"));
    info!("User {} using registry {}", config.user_id(), config.registry);

    let directory = Arc::new(RegistryClient::new(&config.registry));
    let transport = Arc::new(HttpTransport::new(config.resolver()));
    let sender = Arc::new(Sender::new(directory, transport));
    let server = Arc::new(Server::new(listen, config.user_id(), sender));

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
