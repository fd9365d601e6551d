//! registryd server - HTTP surface over the node registry

use crate::config::Config;
use crate::registry::{NodeRegistry, RegistryError};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use onionmesh_net::wire::{ErrorBody, NodeRegistryBody, RegisterNodeBody, RegisteredBody};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(ErrorBody::new(&self))).into_response()
    }
}

/// Build the registry routes
pub fn router(registry: Arc<NodeRegistry>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/getNodeRegistry", get(get_node_registry))
        .route("/registerNode", post(register_node))
        .with_state(registry)
}

async fn status(State(registry): State<Arc<NodeRegistry>>) -> &'static str {
    registry.status()
}

async fn get_node_registry(State(registry): State<Arc<NodeRegistry>>) -> Json<NodeRegistryBody> {
    Json(NodeRegistryBody {
        nodes: registry.list_nodes(),
    })
}

async fn register_node(
    State(registry): State<Arc<NodeRegistry>>,
    body: Result<Json<RegisterNodeBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            debug!("Rejected registration body: {}", rejection);
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::new("nodeId and pubKey are required")),
            )
                .into_response();
        }
    };

    match registry.register(body.node_id, &body.pub_key) {
        Ok(node) => (
            StatusCode::CREATED,
            Json(RegisteredBody {
                message: "Node registered successfully".into(),
                node,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Server state
pub struct Server {
    config: Config,
    registry: Arc<NodeRegistry>,
    /// Shutdown signal
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Create a new server instance with an empty registry
    pub fn new(config: Config) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            registry: Arc::new(NodeRegistry::new()),
            shutdown_tx,
        }
    }

    pub fn registry(&self) -> Arc<NodeRegistry> {
        self.registry.clone()
    }

    /// Bind and serve until [`Server::shutdown`] is called
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.listen).await?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let addr: SocketAddr = listener.local_addr()?;
        info!("Registry listening on {}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, router(self.registry.clone()))
            .with_graceful_shutdown(async move {
                shutdown_rx.recv().await.ok();
            })
            .await?;

        info!(
            "Registry stopped with {} registered nodes",
            self.registry.len()
        );
        Ok(())
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}
