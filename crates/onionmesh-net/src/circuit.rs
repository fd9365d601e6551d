//! Onion circuit selection and construction
//!
//! A circuit is an ordered path of distinct relays chosen for a single
//! message. The envelope is built from the exit hop backwards so that the
//! outermost layer belongs to the entry relay.

use onionmesh_core::{Envelope, HopAddress, Node, NodeId, PlaintextLayer, UserId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use thiserror::Error;

/// Number of relays in every circuit
pub const CIRCUIT_LEN: usize = 3;

/// Circuit errors
#[derive(Debug, Error)]
pub enum CircuitError {
    #[error("Insufficient nodes: {available} registered, {required} required")]
    InsufficientNodes { available: usize, required: usize },
    #[error("Path selector returned an invalid path")]
    InvalidPath,
    #[error("Envelope error: {0}")]
    Envelope(#[from] onionmesh_core::Error),
}

/// Source of relay paths.
///
/// Implementations receive at least `len` candidates and must return `len`
/// distinct nodes in path order (entry first).
pub trait PathSelector: Send {
    fn select(&mut self, candidates: &[Node], len: usize) -> Vec<Node>;
}

/// Uniform selection without replacement
pub struct RandomPath<R = StdRng> {
    rng: R,
}

impl<R: Rng + Send> RandomPath<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomPath<StdRng> {
    /// Seeded from OS entropy
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Reproducible sequence for tests and simulations
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> PathSelector for RandomPath<R> {
    fn select(&mut self, candidates: &[Node], len: usize) -> Vec<Node> {
        rand::seq::index::sample(&mut self.rng, candidates.len(), len)
            .into_iter()
            .map(|i| candidates[i].clone())
            .collect()
    }
}

/// Pinned path, mostly for tests
#[derive(Debug, Clone)]
pub struct FixedPath(pub Vec<NodeId>);

impl PathSelector for FixedPath {
    fn select(&mut self, candidates: &[Node], len: usize) -> Vec<Node> {
        self.0
            .iter()
            .take(len)
            .filter_map(|id| candidates.iter().find(|n| n.id == *id).cloned())
            .collect()
    }
}

/// Ordered relay path for one message
#[derive(Debug, Clone)]
pub struct Circuit {
    path: Vec<Node>,
}

impl Circuit {
    /// Relays in order, entry first
    pub fn path(&self) -> &[Node] {
        &self.path
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.path.iter().map(|n| n.id).collect()
    }

    /// First hop; the sender transmits here
    pub fn entry(&self) -> &Node {
        &self.path[0]
    }

    /// Last hop; the only relay that sees the destination
    pub fn exit(&self) -> &Node {
        &self.path[self.path.len() - 1]
    }

    /// Wrap `message` for `destination`, one layer per hop
    pub fn wrap(&self, message: &[u8], destination: UserId) -> Result<Envelope, CircuitError> {
        let mut next_hop = HopAddress::User(destination);
        let mut payload = message.to_vec();

        for node in self.path.iter().rev() {
            let layer = PlaintextLayer::new(next_hop, payload);
            let envelope = Envelope::seal(&layer, &node.public_key)?;
            next_hop = HopAddress::Relay(node.id);
            payload = envelope.into_bytes();
        }

        Ok(Envelope::from_bytes(payload)?)
    }
}

/// Builder for constructing circuits
#[derive(Debug, Clone, Copy)]
pub struct CircuitBuilder {
    hops: usize,
}

impl CircuitBuilder {
    pub fn new(hops: usize) -> Self {
        Self { hops: hops.max(1) }
    }

    pub fn hops(&self) -> usize {
        self.hops
    }

    /// Pick a path from the registered nodes
    pub fn select(
        &self,
        nodes: &[Node],
        selector: &mut dyn PathSelector,
    ) -> Result<Circuit, CircuitError> {
        if nodes.len() < self.hops {
            return Err(CircuitError::InsufficientNodes {
                available: nodes.len(),
                required: self.hops,
            });
        }

        let path = selector.select(nodes, self.hops);
        let distinct: HashSet<NodeId> = path.iter().map(|n| n.id).collect();
        if path.len() != self.hops || distinct.len() != self.hops {
            return Err(CircuitError::InvalidPath);
        }

        Ok(Circuit { path })
    }
}

impl Default for CircuitBuilder {
    fn default() -> Self {
        Self::new(CIRCUIT_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onionmesh_core::{Error as CoreError, KeyPair, PrivateKey};
    use std::collections::HashMap;

    fn test_nodes(count: u32) -> (Vec<Node>, HashMap<NodeId, PrivateKey>) {
        let mut nodes = Vec::new();
        let mut keys = HashMap::new();
        for id in 1..=count {
            let pair = KeyPair::generate().unwrap();
            nodes.push(Node::new(NodeId(id), pair.public));
            keys.insert(NodeId(id), pair.private);
        }
        (nodes, keys)
    }

    #[test]
    fn test_onion_round_trip() {
        let (nodes, keys) = test_nodes(3);
        let circuit = CircuitBuilder::default()
            .select(&nodes, &mut RandomPath::seeded(7))
            .unwrap();

        let mut envelope = circuit.wrap(b"hello", UserId(42)).unwrap();
        let path = circuit.node_ids();

        for (i, id) in path.iter().enumerate() {
            let layer = envelope.open(&keys[id]).unwrap();
            if i + 1 < path.len() {
                assert_eq!(layer.next_hop, HopAddress::Relay(path[i + 1]));
                assert_ne!(layer.payload, b"hello");
                envelope = Envelope::from_bytes(layer.payload).unwrap();
            } else {
                assert_eq!(layer.next_hop, HopAddress::User(UserId(42)));
                assert_eq!(layer.payload, b"hello");
            }
        }
    }

    #[test]
    fn test_layer_only_opens_for_its_relay() {
        let (nodes, keys) = test_nodes(3);
        let circuit = CircuitBuilder::default()
            .select(&nodes, &mut FixedPath(vec![NodeId(1), NodeId(2), NodeId(3)]))
            .unwrap();
        let envelope = circuit.wrap(b"secret", UserId(5)).unwrap();

        assert!(matches!(
            envelope.open(&keys[&NodeId(2)]),
            Err(CoreError::Decryption)
        ));
        assert!(matches!(
            envelope.open(&keys[&NodeId(3)]),
            Err(CoreError::Decryption)
        ));
        assert!(envelope.open(&keys[&NodeId(1)]).is_ok());
    }

    #[test]
    fn test_insufficient_nodes() {
        let (nodes, _) = test_nodes(2);
        let err = CircuitBuilder::default()
            .select(&nodes, &mut RandomPath::seeded(1))
            .unwrap_err();

        assert!(matches!(
            err,
            CircuitError::InsufficientNodes {
                available: 2,
                required: 3
            }
        ));
    }

    #[test]
    fn test_random_path_distinct_and_reproducible() {
        let (nodes, _) = test_nodes(6);
        let builder = CircuitBuilder::default();

        for seed in 0..20 {
            let a = builder.select(&nodes, &mut RandomPath::seeded(seed)).unwrap();
            let b = builder.select(&nodes, &mut RandomPath::seeded(seed)).unwrap();
            assert_eq!(a.node_ids(), b.node_ids());

            let distinct: HashSet<_> = a.node_ids().into_iter().collect();
            assert_eq!(distinct.len(), 3);
        }
    }

    #[test]
    fn test_fixed_path_order_and_validation() {
        let (nodes, _) = test_nodes(4);
        let builder = CircuitBuilder::default();

        let circuit = builder
            .select(&nodes, &mut FixedPath(vec![NodeId(4), NodeId(1), NodeId(3)]))
            .unwrap();
        assert_eq!(circuit.entry().id, NodeId(4));
        assert_eq!(circuit.exit().id, NodeId(3));

        let repeated = builder.select(&nodes, &mut FixedPath(vec![NodeId(1), NodeId(1), NodeId(2)]));
        assert!(matches!(repeated, Err(CircuitError::InvalidPath)));

        let unknown = builder.select(&nodes, &mut FixedPath(vec![NodeId(1), NodeId(2), NodeId(9)]));
        assert!(matches!(unknown, Err(CircuitError::InvalidPath)));
    }
}
