//! relayd server - HTTP surface of one relay

use crate::processor::{RelayError, RelayProcessor};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use onionmesh_net::wire::{DestinationBody, ErrorBody, MessageBody, ResultBody, STATUS_LIVE};
use onionmesh_net::{RegistryClient, TransportError};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Registration(#[from] TransportError),
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = if self.is_hop_failure() {
            StatusCode::BAD_GATEWAY
        } else {
            StatusCode::BAD_REQUEST
        };
        (status, Json(ErrorBody::new(&self))).into_response()
    }
}

#[derive(Clone)]
struct RelayState {
    processor: Arc<RelayProcessor>,
    expose_private_key: bool,
}

/// Build the relay routes
pub fn router(processor: Arc<RelayProcessor>, expose_private_key: bool) -> Router {
    Router::new()
        .route("/status", get(|| async { STATUS_LIVE }))
        .route("/message", post(message))
        .route(
            "/getLastReceivedEncryptedMessage",
            get(last_received_encrypted),
        )
        .route(
            "/getLastReceivedDecryptedMessage",
            get(last_received_decrypted),
        )
        .route("/getLastMessageDestination", get(last_destination))
        .route("/getPrivateKey", get(private_key))
        .with_state(RelayState {
            processor,
            expose_private_key,
        })
}

async fn message(
    State(state): State<RelayState>,
    body: Result<Json<MessageBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::new("message is required")),
            )
                .into_response()
        }
    };

    match state.processor.process(&body.message).await {
        Ok(action) => Json(ResultBody::new(action.decrypted())).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn last_received_encrypted(State(state): State<RelayState>) -> Json<ResultBody<Option<String>>> {
    Json(ResultBody::new(
        state.processor.observations().last_received_encrypted(),
    ))
}

async fn last_received_decrypted(State(state): State<RelayState>) -> Json<ResultBody<Option<String>>> {
    Json(ResultBody::new(
        state.processor.observations().last_received_decrypted(),
    ))
}

async fn last_destination(State(state): State<RelayState>) -> Json<DestinationBody> {
    Json(ResultBody::new(
        state.processor.observations().last_destination(),
    ))
}

async fn private_key(State(state): State<RelayState>) -> Response {
    if !state.expose_private_key {
        return StatusCode::NOT_FOUND.into_response();
    }
    match state.processor.private_key().to_base64() {
        Ok(key) => Json(ResultBody::new(key)).into_response(),
        Err(e) => {
            error!("Private key export failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::new(e))).into_response()
        }
    }
}

/// Server state
pub struct Server {
    listen: SocketAddr,
    processor: Arc<RelayProcessor>,
    expose_private_key: bool,
    /// Shutdown signal
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    pub fn new(listen: SocketAddr, processor: Arc<RelayProcessor>, expose_private_key: bool) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            listen,
            processor,
            expose_private_key,
            shutdown_tx,
        }
    }

    /// Bind the listen address, then register our public key.
    ///
    /// The registry never drops entries, so nothing is registered unless
    /// the relay can actually accept messages.
    pub async fn bind_and_register(
        &self,
        registry: &RegistryClient,
    ) -> Result<TcpListener, ServerError> {
        let listener = TcpListener::bind(self.listen).await?;
        let node = registry
            .register(self.processor.node_id(), self.processor.public_key())
            .await?;
        info!(
            "Relay {} registered with {} ({:?})",
            node.id,
            registry.base_url(),
            node.public_key
        );
        Ok(listener)
    }

    /// Serve on an already-bound listener until [`Server::shutdown`] is called
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        info!(
            "Relay {} listening on {}",
            self.processor.node_id(),
            listener.local_addr()?
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(
            listener,
            router(self.processor.clone(), self.expose_private_key),
        )
        .with_graceful_shutdown(async move {
            shutdown_rx.recv().await.ok();
        })
        .await?;
        Ok(())
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}
