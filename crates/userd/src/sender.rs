//! Message origination: pick a circuit, wrap the onion, hand it to the entry relay

use onionmesh_core::UserId;
use onionmesh_net::{
    Circuit, CircuitBuilder, CircuitError, NodeDirectory, PathSelector, RandomPath, Transport,
    TransportError,
};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Send errors
#[derive(Debug, Error)]
pub enum SendError {
    #[error("Circuit error: {0}")]
    Circuit(#[from] CircuitError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SendError {
    pub fn is_insufficient_nodes(&self) -> bool {
        matches!(
            self,
            Self::Circuit(CircuitError::InsufficientNodes { .. })
        )
    }
}

/// Builds a fresh circuit for every message.
///
/// Circuits are never reused; a failed send is not retried.
pub struct Sender {
    directory: Arc<dyn NodeDirectory>,
    transport: Arc<dyn Transport>,
    selector: Mutex<Box<dyn PathSelector>>,
    builder: CircuitBuilder,
}

impl Sender {
    pub fn new(directory: Arc<dyn NodeDirectory>, transport: Arc<dyn Transport>) -> Self {
        Self {
            directory,
            transport,
            selector: Mutex::new(Box::new(RandomPath::from_entropy())),
            builder: CircuitBuilder::default(),
        }
    }

    /// Replace the path source (deterministic tests, pinned paths)
    pub fn with_selector(mut self, selector: impl PathSelector + 'static) -> Self {
        self.selector = Mutex::new(Box::new(selector));
        self
    }

    /// Wrap `message` for `destination` and transmit it to the entry relay
    pub async fn send(&self, message: &str, destination: UserId) -> Result<Circuit, SendError> {
        let nodes = self.directory.list_nodes().await?;

        let circuit = {
            let mut selector = self.selector.lock();
            self.builder.select(&nodes, selector.as_mut())?
        };
        debug!("Circuit for user {}: {:?}", destination, circuit.node_ids());

        let envelope = circuit.wrap(message.as_bytes(), destination)?;
        self.transport
            .forward(circuit.entry().id, &envelope)
            .await?;

        info!(
            "Sent {} byte onion for user {} via entry relay {}",
            envelope.len(),
            destination,
            circuit.entry().id
        );
        Ok(circuit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use onionmesh_core::{Envelope, KeyPair, NodeId};
    use parking_lot::RwLock;
    use registryd::NodeRegistry;
    use relayd::RelayProcessor;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::inbox::UserObservations;

    /// In-process network: relays and user inboxes addressed by id
    #[derive(Default)]
    struct Mesh {
        relays: RwLock<HashMap<NodeId, Arc<RelayProcessor>>>,
        inboxes: RwLock<HashMap<UserId, Arc<UserObservations>>>,
        transmissions: AtomicUsize,
    }

    #[async_trait]
    impl Transport for Mesh {
        async fn forward(&self, to: NodeId, envelope: &Envelope) -> Result<(), TransportError> {
            self.transmissions.fetch_add(1, Ordering::SeqCst);
            let relay = self
                .relays
                .read()
                .get(&to)
                .cloned()
                .ok_or_else(|| TransportError::Forward {
                    to,
                    reason: "unknown relay".into(),
                })?;
            relay
                .process(&envelope.to_base64())
                .await
                .map(|_| ())
                .map_err(|e| TransportError::Forward {
                    to,
                    reason: e.to_string(),
                })
        }

        async fn deliver(&self, to: UserId, message: &str) -> Result<(), TransportError> {
            self.transmissions.fetch_add(1, Ordering::SeqCst);
            let inbox = self
                .inboxes
                .read()
                .get(&to)
                .cloned()
                .ok_or_else(|| TransportError::Delivery {
                    to,
                    reason: "unknown user".into(),
                })?;
            inbox.record_received(message);
            Ok(())
        }
    }

    /// Registry plus mesh with relays `1..=count`
    fn network(count: u32) -> (Arc<NodeRegistry>, Arc<Mesh>) {
        let registry = Arc::new(NodeRegistry::new());
        let mesh = Arc::new(Mesh::default());

        for id in 1..=count {
            let keys = KeyPair::generate().unwrap();
            registry
                .register(NodeId(id), &keys.public.to_base64())
                .unwrap();
            let relay = Arc::new(RelayProcessor::new(NodeId(id), keys, mesh.clone()));
            mesh.relays.write().insert(NodeId(id), relay);
        }
        (registry, mesh)
    }

    #[tokio::test]
    async fn test_hello_reaches_user_42() {
        let (registry, mesh) = network(3);
        let inbox = Arc::new(UserObservations::new());
        mesh.inboxes.write().insert(UserId(42), inbox.clone());

        let sender = Sender::new(registry, mesh.clone()).with_selector(RandomPath::seeded(42));
        let circuit = sender.send("hello", UserId(42)).await.unwrap();

        assert_eq!(inbox.last_received_message().as_deref(), Some("hello"));

        let path = circuit.node_ids();
        let relays = mesh.relays.read();
        let exit = relays[&path[2]].observations();
        assert_eq!(exit.last_received_decrypted().as_deref(), Some("hello"));
        assert_eq!(
            exit.last_destination(),
            Some(onionmesh_core::HopAddress::User(UserId(42)))
        );

        for id in &path[..2] {
            let observed = relays[id].observations();
            assert_ne!(observed.last_received_decrypted().as_deref(), Some("hello"));
            assert!(!observed.last_destination().unwrap().is_user());
        }
    }

    #[tokio::test]
    async fn test_insufficient_nodes_sends_nothing() {
        let (registry, mesh) = network(2);
        let sender = Sender::new(registry, mesh.clone());

        let err = sender.send("hello", UserId(1)).await.unwrap_err();
        assert!(err.is_insufficient_nodes());
        assert_eq!(mesh.transmissions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_hop_is_reported() {
        let (registry, mesh) = network(3);
        // No inbox for user 9: the exit relay's delivery fails
        let sender = Sender::new(registry, mesh.clone());

        let err = sender.send("hello", UserId(9)).await.unwrap_err();
        assert!(matches!(err, SendError::Transport(TransportError::Forward { .. })));
        assert!(err.to_string().contains("unknown user"));
    }

    #[tokio::test]
    async fn test_fresh_circuit_per_message() {
        let (registry, mesh) = network(5);
        let inbox = Arc::new(UserObservations::new());
        mesh.inboxes.write().insert(UserId(1), inbox.clone());
        let sender = Sender::new(registry, mesh).with_selector(RandomPath::seeded(3));

        let mut paths = Vec::new();
        for i in 0..4 {
            let circuit = sender.send(&format!("msg {i}"), UserId(1)).await.unwrap();
            assert_eq!(inbox.last_received_message(), Some(format!("msg {i}")));
            paths.push(circuit.node_ids());
        }
        paths.dedup();
        assert!(paths.len() > 1);
    }
}
