//! Relay processing: peel one layer, then forward or deliver

use crate::observe::RelayObservations;
use onionmesh_core::{
    Envelope, Error as OnionError, HopAddress, KeyPair, NodeId, PrivateKey, PublicKey, UserId,
};
use onionmesh_net::{Transport, TransportError};
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Relay errors
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Onion error: {0}")]
    Onion(#[from] OnionError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RelayError {
    /// True when the layer was valid but the next hop could not be reached
    pub fn is_hop_failure(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Result of peeling a layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayAction {
    /// Forward the inner envelope to the next relay
    Forward { to: NodeId, envelope: Envelope },
    /// Deliver plaintext to a user (we are the exit)
    Deliver { to: UserId, message: String },
}

impl RelayAction {
    pub fn destination(&self) -> HopAddress {
        match self {
            Self::Forward { to, .. } => HopAddress::Relay(*to),
            Self::Deliver { to, .. } => HopAddress::User(*to),
        }
    }

    /// Text form of the peeled payload
    pub fn decrypted(&self) -> String {
        match self {
            Self::Forward { envelope, .. } => envelope.to_base64(),
            Self::Deliver { message, .. } => message.clone(),
        }
    }
}

/// Relay statistics
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    pub messages_processed: u64,
    pub messages_forwarded: u64,
    pub messages_delivered: u64,
    pub messages_rejected: u64,
    pub dispatch_failures: u64,
}

/// Relay node handler.
///
/// Holds no per-circuit state; every message is handled on its own.
pub struct RelayProcessor {
    /// Our node ID
    node_id: NodeId,
    /// Long-lived key pair registered with the registry
    keys: KeyPair,
    transport: Arc<dyn Transport>,
    observations: RelayObservations,
    stats: RwLock<RelayStats>,
}

impl RelayProcessor {
    pub fn new(node_id: NodeId, keys: KeyPair, transport: Arc<dyn Transport>) -> Self {
        Self {
            node_id,
            keys,
            transport,
            observations: RelayObservations::new(),
            stats: RwLock::new(RelayStats::default()),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.keys.public
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.keys.private
    }

    pub fn observations(&self) -> &RelayObservations {
        &self.observations
    }

    /// Decode, unwrap and interpret one layer without dispatching it
    pub fn peel(&self, envelope_text: &str) -> Result<RelayAction, OnionError> {
        let envelope = Envelope::from_base64(envelope_text)?;
        let layer = envelope.open(&self.keys.private)?;

        match layer.next_hop {
            HopAddress::Relay(to) => Ok(RelayAction::Forward {
                to,
                envelope: Envelope::from_bytes(layer.payload)?,
            }),
            HopAddress::User(to) => {
                let message = String::from_utf8(layer.payload).map_err(|_| {
                    OnionError::InvalidEnvelope("exit payload is not UTF-8".into())
                })?;
                Ok(RelayAction::Deliver { to, message })
            }
        }
    }

    /// Handle one inbound envelope end to end.
    ///
    /// Nothing is sent onward unless the layer authenticated. A failed
    /// forward or delivery is returned as-is; there is no retry.
    pub async fn process(&self, envelope_text: &str) -> Result<RelayAction, RelayError> {
        self.observations.record_encrypted(envelope_text);
        self.stats.write().messages_processed += 1;

        let action = match self.peel(envelope_text) {
            Ok(action) => action,
            Err(e) => {
                warn!("Relay {} rejected message: {}", self.node_id, e);
                self.stats.write().messages_rejected += 1;
                return Err(e.into());
            }
        };
        self.observations.record_decrypted(action.decrypted());

        let sent = match &action {
            RelayAction::Forward { to, envelope } => {
                debug!(
                    "Relay {} forwarding {} bytes to relay {}",
                    self.node_id,
                    envelope.len(),
                    to
                );
                self.transport.forward(*to, envelope).await
            }
            RelayAction::Deliver { to, message } => {
                debug!("Relay {} delivering to user {}", self.node_id, to);
                self.transport.deliver(*to, message).await
            }
        };

        if let Err(e) = sent {
            warn!("Relay {}: {}", self.node_id, e);
            self.stats.write().dispatch_failures += 1;
            return Err(e.into());
        }

        self.observations.record_destination(action.destination());
        {
            let mut stats = self.stats.write();
            match action {
                RelayAction::Forward { .. } => stats.messages_forwarded += 1,
                RelayAction::Deliver { .. } => stats.messages_delivered += 1,
            }
        }
        Ok(action)
    }

    /// Get relay statistics
    pub fn stats(&self) -> RelayStats {
        self.stats.read().clone()
    }
}
