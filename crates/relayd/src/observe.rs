//! Diagnostic view of the last message a relay handled
//!
//! Overwritten by every message with no ordering across concurrent requests.
//! Nothing in the protocol reads these values back.

use onionmesh_core::HopAddress;
use parking_lot::RwLock;

#[derive(Debug, Clone, Default)]
struct Observed {
    encrypted: Option<String>,
    decrypted: Option<String>,
    destination: Option<HopAddress>,
}

/// Last-write-wins observation slots owned by one relay
#[derive(Debug, Default)]
pub struct RelayObservations {
    inner: RwLock<Observed>,
}

impl RelayObservations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_encrypted(&self, envelope: impl Into<String>) {
        self.inner.write().encrypted = Some(envelope.into());
    }

    pub fn record_decrypted(&self, layer: impl Into<String>) {
        self.inner.write().decrypted = Some(layer.into());
    }

    pub fn record_destination(&self, destination: HopAddress) {
        self.inner.write().destination = Some(destination);
    }

    /// Base64 envelope as received
    pub fn last_received_encrypted(&self) -> Option<String> {
        self.inner.read().encrypted.clone()
    }

    /// Inner payload after peeling: base64 envelope or the delivered message
    pub fn last_received_decrypted(&self) -> Option<String> {
        self.inner.read().decrypted.clone()
    }

    pub fn last_destination(&self) -> Option<HopAddress> {
        self.inner.read().destination
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onionmesh_core::{NodeId, UserId};

    #[test]
    fn test_starts_empty() {
        let observed = RelayObservations::new();
        assert!(observed.last_received_encrypted().is_none());
        assert!(observed.last_received_decrypted().is_none());
        assert!(observed.last_destination().is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let observed = RelayObservations::new();
        observed.record_destination(HopAddress::Relay(NodeId(1)));
        observed.record_destination(HopAddress::User(UserId(9)));
        observed.record_decrypted("first");
        observed.record_decrypted("second");

        assert_eq!(observed.last_destination(), Some(HopAddress::User(UserId(9))));
        assert_eq!(observed.last_received_decrypted().as_deref(), Some("second"));
    }
}
