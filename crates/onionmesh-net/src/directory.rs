//! Node directory access
//!
//! Senders pull the full node list before every circuit; relays register
//! their public key once at startup.

use crate::transport::TransportError;
use crate::wire::{ErrorBody, NodeRegistryBody, RegisterNodeBody, RegisteredBody, STATUS_LIVE};
use async_trait::async_trait;
use onionmesh_core::{Node, NodeId, PublicKey};
use tracing::debug;

/// Read access to the registered nodes
#[async_trait]
pub trait NodeDirectory: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<Node>, TransportError>;
}

/// Fixed node list
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory(pub Vec<Node>);

#[async_trait]
impl NodeDirectory for StaticDirectory {
    async fn list_nodes(&self) -> Result<Vec<Node>, TransportError> {
        Ok(self.0.clone())
    }
}

/// HTTP client for the registry service
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: reqwest::Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check the registry answers `live`
    pub async fn status(&self) -> Result<(), TransportError> {
        let body = self
            .client
            .get(format!("{}/status", self.base_url))
            .send()
            .await
            .map_err(|e| TransportError::Registry(e.to_string()))?
            .text()
            .await
            .map_err(|e| TransportError::Registry(e.to_string()))?;

        if body.trim() == STATUS_LIVE {
            Ok(())
        } else {
            Err(TransportError::Registry(format!("unexpected status {body:?}")))
        }
    }

    /// Register a relay's public key
    pub async fn register(&self, id: NodeId, key: &PublicKey) -> Result<Node, TransportError> {
        let response = self
            .client
            .post(format!("{}/registerNode", self.base_url))
            .json(&RegisterNodeBody {
                node_id: id,
                pub_key: key.to_base64(),
            })
            .send()
            .await
            .map_err(|e| TransportError::Registry(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let reason = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(TransportError::Registry(format!(
                "registration of node {id} rejected ({status}): {reason}"
            )));
        }

        let body: RegisteredBody = response
            .json()
            .await
            .map_err(|e| TransportError::Registry(e.to_string()))?;
        debug!("Registered node {} with {}", body.node.id, self.base_url);
        Ok(body.node)
    }
}

#[async_trait]
impl NodeDirectory for RegistryClient {
    async fn list_nodes(&self) -> Result<Vec<Node>, TransportError> {
        let body: NodeRegistryBody = self
            .client
            .get(format!("{}/getNodeRegistry", self.base_url))
            .send()
            .await
            .map_err(|e| TransportError::Registry(e.to_string()))?
            .error_for_status()
            .map_err(|e| TransportError::Registry(e.to_string()))?
            .json()
            .await
            .map_err(|e| TransportError::Registry(e.to_string()))?;

        debug!("Fetched {} nodes from {}", body.nodes.len(), self.base_url);
        Ok(body.nodes)
    }
}
