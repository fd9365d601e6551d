//! Node registry: relay ids and their persistent public keys

use async_trait::async_trait;
use onionmesh_core::{Node, NodeId, PublicKey};
use onionmesh_net::wire::STATUS_LIVE;
use onionmesh_net::{NodeDirectory, TransportError};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{info, warn};

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Node already registered: {0}")]
    DuplicateId(NodeId),
    #[error("Duplicate public key, already held by node {0}")]
    DuplicateKey(NodeId),
    #[error("Malformed public key: {0}")]
    MalformedKey(String),
}

#[derive(Default)]
struct RegistryState {
    nodes: BTreeMap<NodeId, Node>,
    /// Key fingerprint -> holder
    keys: HashMap<[u8; 32], NodeId>,
}

/// In-memory node directory for the lifetime of the process.
///
/// Entries are never removed or replaced.
#[derive(Default)]
pub struct NodeRegistry {
    state: RwLock<RegistryState>,
}

impl NodeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node from its base64 SPKI public key
    pub fn register(&self, id: NodeId, pub_key: &str) -> Result<Node, RegistryError> {
        let key = PublicKey::from_base64(pub_key).map_err(|e| {
            warn!("Rejected key for node {}: {}", id, e);
            RegistryError::MalformedKey(e.to_string())
        })?;
        self.register_key(id, key)
    }

    /// Register an already-parsed key.
    ///
    /// Both uniqueness checks and the insert happen under one write lock.
    /// A key collision is reported before an id collision.
    pub fn register_key(&self, id: NodeId, key: PublicKey) -> Result<Node, RegistryError> {
        let fingerprint = key.fingerprint();

        let mut state = self.state.write();
        if let Some(holder) = state.keys.get(&fingerprint) {
            warn!("Rejected node {}: key already held by node {}", id, holder);
            return Err(RegistryError::DuplicateKey(*holder));
        }
        if state.nodes.contains_key(&id) {
            warn!("Rejected duplicate id {}", id);
            return Err(RegistryError::DuplicateId(id));
        }

        let node = Node::new(id, key);
        state.keys.insert(fingerprint, id);
        state.nodes.insert(id, node.clone());
        drop(state);

        info!(
            "Registered node {} (key {})",
            id,
            hex::encode(&fingerprint[..8])
        );
        Ok(node)
    }

    /// Snapshot of all nodes, ordered by id
    pub fn list_nodes(&self) -> Vec<Node> {
        self.state.read().nodes.values().cloned().collect()
    }

    /// Look up one node
    pub fn get(&self, id: NodeId) -> Option<Node> {
        self.state.read().nodes.get(&id).cloned()
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.state.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Liveness check
    pub fn status(&self) -> &'static str {
        STATUS_LIVE
    }
}

#[async_trait]
impl NodeDirectory for NodeRegistry {
    async fn list_nodes(&self) -> Result<Vec<Node>, TransportError> {
        Ok(NodeRegistry::list_nodes(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onionmesh_core::KeyPair;
    use std::sync::Arc;

    #[test]
    fn test_register_and_list() {
        let registry = NodeRegistry::new();
        let a = KeyPair::generate().unwrap();
        let b = KeyPair::generate().unwrap();

        registry.register(NodeId(2), &b.public.to_base64()).unwrap();
        registry.register(NodeId(1), &a.public.to_base64()).unwrap();

        let nodes = registry.list_nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0], Node::new(NodeId(1), a.public));
        assert_eq!(nodes[1], Node::new(NodeId(2), b.public));
        assert_eq!(registry.status(), "live");
    }

    #[test]
    fn test_duplicate_id() {
        let registry = NodeRegistry::new();
        let a = KeyPair::generate().unwrap();
        let b = KeyPair::generate().unwrap();

        registry.register_key(NodeId(1), a.public).unwrap();
        let err = registry.register_key(NodeId(1), b.public).unwrap_err();

        assert!(matches!(err, RegistryError::DuplicateId(NodeId(1))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_key() {
        let registry = NodeRegistry::new();
        let a = KeyPair::generate().unwrap();

        registry.register_key(NodeId(1), a.public.clone()).unwrap();
        let err = registry.register_key(NodeId(2), a.public).unwrap_err();

        assert!(matches!(err, RegistryError::DuplicateKey(NodeId(1))));
        assert!(registry.get(NodeId(2)).is_none());
    }

    #[test]
    fn test_key_collision_reported_before_id() {
        let registry = NodeRegistry::new();
        let a = KeyPair::generate().unwrap();

        registry.register_key(NodeId(1), a.public.clone()).unwrap();
        let err = registry.register_key(NodeId(1), a.public).unwrap_err();

        assert!(matches!(err, RegistryError::DuplicateKey(NodeId(1))));
    }

    #[test]
    fn test_whitespace_around_key_rejected() {
        let registry = NodeRegistry::new();
        let a = KeyPair::generate().unwrap();

        let padded = format!(" {}\n", a.public.to_base64());
        assert!(matches!(
            registry.register(NodeId(1), &padded),
            Err(RegistryError::MalformedKey(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_malformed_key() {
        let registry = NodeRegistry::new();

        for bad in ["", "not-base64!!", "aGVsbG8="] {
            assert!(matches!(
                registry.register(NodeId(1), bad),
                Err(RegistryError::MalformedKey(_))
            ));
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_same_id_single_winner() {
        let registry = Arc::new(NodeRegistry::new());
        let keys: Vec<_> = (0..4).map(|_| KeyPair::generate().unwrap()).collect();

        let handles: Vec<_> = keys
            .into_iter()
            .map(|pair| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.register_key(NodeId(7), pair.public).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_directory_view() {
        let registry = NodeRegistry::new();
        let a = KeyPair::generate().unwrap();
        registry.register_key(NodeId(3), a.public).unwrap();

        let directory: &dyn NodeDirectory = &registry;
        assert_eq!(directory.list_nodes().await.unwrap().len(), 1);
    }
}
