//! Last sent and received messages of one user endpoint

use parking_lot::RwLock;

/// Last-write-wins diagnostic slots
#[derive(Debug, Default)]
pub struct UserObservations {
    received: RwLock<Option<String>>,
    sent: RwLock<Option<String>>,
}

impl UserObservations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called for every plaintext an exit relay delivers to us
    pub fn record_received(&self, message: impl Into<String>) {
        *self.received.write() = Some(message.into());
    }

    /// Called once the entry relay has accepted our onion
    pub fn record_sent(&self, message: impl Into<String>) {
        *self.sent.write() = Some(message.into());
    }

    pub fn last_received_message(&self) -> Option<String> {
        self.received.read().clone()
    }

    pub fn last_sent_message(&self) -> Option<String> {
        self.sent.read().clone()
    }
}
