//! relayd - OnionMesh relay daemon
//!
//! Generates the relay's key pair once, registers the public half with the
//! registry and then peels one layer from every envelope it receives.

use clap::Parser;
use onionmesh_core::KeyPair;
use onionmesh_net::{HttpTransport, RegistryClient};
use relayd::config::Config;
use relayd::processor::RelayProcessor;
use relayd::server::Server;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_logging(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("relayd=info"));
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

    let listen = match config.validate().and_then(|_| config.listen_addr()) {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("relayd v{} - OnionMesh Relay", env!("CARGO_PKG_VERSION"));

    // Generate the relay keypair; it lives as long as the process
    let keypair = match KeyPair::generate() {
        Ok(keypair) => keypair,
        Err(e) => {
            error!("Key generation failed: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let node_id = config.node_id();

    let transport = Arc::new(HttpTransport::new(config.resolver()));
    let processor = Arc::new(RelayProcessor::new(node_id, keypair, transport));
    let server = Arc::new(Server::new(
        listen,
        processor.clone(),
        config.expose_private_key,
    ));

    // Only a relay that is already listening gets registered
    let registry = RegistryClient::new(&config.registry);
    let listener = match server.bind_and_register(&registry).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Could not start relay {}: {}", node_id, e);
            return ExitCode::FAILURE;
        }
    };

    let signal_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_server.shutdown();
    });

    if let Err(e) = server.serve(listener).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    // Print final stats
    let stats = processor.stats();
    info!(
        "Final stats: {} processed, {} forwarded, {} delivered, {} rejected, {} dispatch failures",
        stats.messages_processed,
        stats.messages_forwarded,
        stats.messages_delivered,
        stats.messages_rejected,
        stats.dispatch_failures
    );

    ExitCode::SUCCESS
}
