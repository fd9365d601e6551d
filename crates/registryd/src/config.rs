//! Configuration for registryd

use clap::Parser;
use std::net::SocketAddr;

/// registryd - OnionMesh node registry daemon
#[derive(Parser, Debug, Clone)]
#[command(name = "registryd")]
#[command(author, version, about = "OnionMesh node registry daemon", long_about = None)]
pub struct Config {
    /// Listen address for the HTTP API
    #[arg(short, long, env = "ONIONMESH_REGISTRY_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Log format (json or pretty)
    #[arg(long, default_value = "pretty")]
    pub log_format: String,
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            anyhow::bail!("Unknown log format {:?} (expected json or pretty)", self.log_format);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse_from(["registryd"]);
        assert_eq!(config.listen.port(), 8080);
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        let config = Config::parse_from(["registryd", "--log-format", "xml"]);
        assert!(config.validate().is_err());
    }
}
