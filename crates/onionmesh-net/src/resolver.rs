//! Address resolution from protocol ids to service endpoints
//!
//! The protocol layer only knows node and user ids. Deployments decide how
//! those map onto hosts and ports.

use onionmesh_core::{NodeId, UserId};
use std::collections::HashMap;

/// Maps ids to base URLs (scheme, host and port, no trailing slash)
pub trait AddressResolver: Send + Sync {
    fn relay_endpoint(&self, id: NodeId) -> Option<String>;
    fn user_endpoint(&self, id: UserId) -> Option<String>;
}

/// Port-offset layout: every service on one host, `base + id`
#[derive(Debug, Clone)]
pub struct PortMap {
    host: String,
    base_relay_port: u16,
    base_user_port: u16,
}

impl PortMap {
    pub fn new(host: impl Into<String>, base_relay_port: u16, base_user_port: u16) -> Self {
        Self {
            host: host.into(),
            base_relay_port,
            base_user_port,
        }
    }

    pub fn relay_port(&self, id: NodeId) -> Option<u16> {
        offset_port(self.base_relay_port, id.0)
    }

    pub fn user_port(&self, id: UserId) -> Option<u16> {
        offset_port(self.base_user_port, id.0)
    }
}

fn offset_port(base: u16, id: u32) -> Option<u16> {
    u16::try_from(u32::from(base).checked_add(id)?).ok()
}

impl AddressResolver for PortMap {
    fn relay_endpoint(&self, id: NodeId) -> Option<String> {
        self.relay_port(id)
            .map(|port| format!("http://{}:{port}", self.host))
    }

    fn user_endpoint(&self, id: UserId) -> Option<String> {
        self.user_port(id)
            .map(|port| format!("http://{}:{port}", self.host))
    }
}

/// Explicit table of endpoints
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    relays: HashMap<NodeId, String>,
    users: HashMap<UserId, String>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_relay(mut self, id: NodeId, endpoint: impl Into<String>) -> Self {
        self.relays.insert(id, endpoint.into());
        self
    }

    pub fn with_user(mut self, id: UserId, endpoint: impl Into<String>) -> Self {
        self.users.insert(id, endpoint.into());
        self
    }
}

impl AddressResolver for StaticResolver {
    fn relay_endpoint(&self, id: NodeId) -> Option<String> {
        self.relays.get(&id).cloned()
    }

    fn user_endpoint(&self, id: UserId) -> Option<String> {
        self.users.get(&id).cloned()
    }
}
