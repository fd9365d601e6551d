//! Hop-to-hop transport
//!
//! Relays forward envelopes to other relays and deliver plaintext to user
//! inboxes. Both are single attempts: a failure is reported to the caller and
//! never retried here.

use crate::resolver::AddressResolver;
use crate::wire::{ErrorBody, MessageBody};
use async_trait::async_trait;
use onionmesh_core::{Envelope, NodeId, UserId};
use thiserror::Error;
use tracing::debug;

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Forward to relay {to} failed: {reason}")]
    Forward { to: NodeId, reason: String },
    #[error("Delivery to user {to} failed: {reason}")]
    Delivery { to: UserId, reason: String },
    #[error("Registry request failed: {0}")]
    Registry(String),
}

/// Outbound side of a relay or sender
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send an envelope to a relay's inbox
    async fn forward(&self, to: NodeId, envelope: &Envelope) -> Result<(), TransportError>;

    /// Hand plaintext to a user's inbox
    async fn deliver(&self, to: UserId, message: &str) -> Result<(), TransportError>;
}

/// JSON-over-HTTP transport
pub struct HttpTransport<R> {
    client: reqwest::Client,
    resolver: R,
}

impl<R: AddressResolver> HttpTransport<R> {
    pub fn new(resolver: R) -> Self {
        Self::with_client(reqwest::Client::new(), resolver)
    }

    pub fn with_client(client: reqwest::Client, resolver: R) -> Self {
        Self { client, resolver }
    }

    /// POST `{message}` and map any non-2xx into a reason string
    async fn post_message(&self, url: String, message: String) -> Result<(), String> {
        let response = self
            .client
            .post(&url)
            .json(&MessageBody { message })
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let reason = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.to_string(),
        };
        Err(format!("{status}: {reason}"))
    }
}

#[async_trait]
impl<R: AddressResolver> Transport for HttpTransport<R> {
    async fn forward(&self, to: NodeId, envelope: &Envelope) -> Result<(), TransportError> {
        let endpoint = self
            .resolver
            .relay_endpoint(to)
            .ok_or_else(|| TransportError::Forward {
                to,
                reason: "no endpoint for relay".into(),
            })?;

        debug!("Forwarding {} bytes to relay {} at {}", envelope.len(), to, endpoint);
        self.post_message(format!("{endpoint}/message"), envelope.to_base64())
            .await
            .map_err(|reason| TransportError::Forward { to, reason })
    }

    async fn deliver(&self, to: UserId, message: &str) -> Result<(), TransportError> {
        let endpoint = self
            .resolver
            .user_endpoint(to)
            .ok_or_else(|| TransportError::Delivery {
                to,
                reason: "no endpoint for user".into(),
            })?;

        debug!("Delivering to user {} at {}", to, endpoint);
        self.post_message(format!("{endpoint}/message"), message.to_string())
            .await
            .map_err(|reason| TransportError::Delivery { to, reason })
    }
}
