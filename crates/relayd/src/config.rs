//! relayd configuration

use clap::Parser;
use onionmesh_core::NodeId;
use onionmesh_net::PortMap;
use std::net::SocketAddr;

/// OnionMesh Relay Daemon
#[derive(Parser, Debug, Clone)]
#[command(name = "relayd")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Relay id to register under
    #[arg(long, env = "ONIONMESH_NODE_ID")]
    pub node_id: u32,

    /// Listen address (defaults to 0.0.0.0 on base-relay-port + node id)
    #[arg(short, long)]
    pub listen: Option<SocketAddr>,

    /// Registry base URL
    #[arg(long, env = "ONIONMESH_REGISTRY", default_value = "http://localhost:8080")]
    pub registry: String,

    /// Host other relays and users are reachable on
    #[arg(long, default_value = "localhost")]
    pub peer_host: String,

    /// Relay N listens on base-relay-port + N
    #[arg(long, default_value = "4000")]
    pub base_relay_port: u16,

    /// User N listens on base-user-port + N
    #[arg(long, default_value = "3000")]
    pub base_user_port: u16,

    /// Serve GET /getPrivateKey (test harnesses only)
    #[arg(long)]
    pub expose_private_key: bool,

    /// Log format (json or pretty)
    #[arg(long, default_value = "pretty")]
    pub log_format: String,
}

impl Config {
    pub fn node_id(&self) -> NodeId {
        NodeId(self.node_id)
    }

    /// Peer endpoint layout
    pub fn resolver(&self) -> PortMap {
        PortMap::new(&self.peer_host, self.base_relay_port, self.base_user_port)
    }

    /// Address this relay binds
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        if let Some(addr) = self.listen {
            return Ok(addr);
        }
        let port = self
            .resolver()
            .relay_port(self.node_id())
            .ok_or_else(|| anyhow::anyhow!("Relay port for node {} overflows", self.node_id))?;
        Ok(SocketAddr::from(([0, 0, 0, 0], port)))
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.listen_addr()?;
        if !self.registry.starts_with("http://") && !self.registry.starts_with("https://") {
            anyhow::bail!("Registry URL must start with http:// or https://");
        }
        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            anyhow::bail!("Unknown log format {:?} (expected json or pretty)", self.log_format);
        }
        Ok(())
    }
}
