//! userd server - HTTP surface of one user endpoint

use crate::inbox::UserObservations;
use crate::sender::{SendError, Sender};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use onionmesh_core::UserId;
use onionmesh_net::wire::{ErrorBody, MessageBody, ResultBody, SendMessageBody, STATUS_LIVE};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for SendError {
    fn into_response(self) -> Response {
        let status = match &self {
            SendError::Transport(_) => StatusCode::BAD_GATEWAY,
            SendError::Circuit(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody::new(&self))).into_response()
    }
}

#[derive(Clone)]
struct UserState {
    user_id: UserId,
    sender: Arc<Sender>,
    observations: Arc<UserObservations>,
}

/// Build the user routes
pub fn router(user_id: UserId, sender: Arc<Sender>, observations: Arc<UserObservations>) -> Router {
    Router::new()
        .route("/status", get(|| async { STATUS_LIVE }))
        .route("/getLastReceivedMessage", get(last_received))
        .route("/getLastSentMessage", get(last_sent))
        .route("/message", post(receive))
        .route("/sendMessage", post(send_message))
        .with_state(UserState {
            user_id,
            sender,
            observations,
        })
}

fn bad_request(error: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody::new(error))).into_response()
}

async fn last_received(State(state): State<UserState>) -> Json<ResultBody<Option<String>>> {
    Json(ResultBody::new(state.observations.last_received_message()))
}

async fn last_sent(State(state): State<UserState>) -> Json<ResultBody<Option<String>>> {
    Json(ResultBody::new(state.observations.last_sent_message()))
}

async fn receive(
    State(state): State<UserState>,
    body: Result<Json<MessageBody>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = body else {
        return bad_request("message is required");
    };
    debug!("User {} received {} bytes", state.user_id, body.message.len());
    state.observations.record_received(body.message.clone());
    Json(ResultBody::new(body.message)).into_response()
}

async fn send_message(
    State(state): State<UserState>,
    body: Result<Json<SendMessageBody>, JsonRejection>,
) -> Response {
    let Ok(Json(body)) = body else {
        return bad_request("message and destinationUserId are required");
    };

    match state
        .sender
        .send(&body.message, body.destination_user_id)
        .await
    {
        Ok(_) => {
            state.observations.record_sent(body.message);
            Json(ResultBody::new("Message sent successfully")).into_response()
        }
        Err(e) => {
            warn!("User {} send failed: {}", state.user_id, e);
            e.into_response()
        }
    }
}

/// Server state
pub struct Server {
    listen: SocketAddr,
    user_id: UserId,
    sender: Arc<Sender>,
    observations: Arc<UserObservations>,
    /// Shutdown signal
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    pub fn new(listen: SocketAddr, user_id: UserId, sender: Arc<Sender>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            listen,
            user_id,
            sender,
            observations: Arc::new(UserObservations::new()),
            shutdown_tx,
        }
    }

    pub fn observations(&self) -> Arc<UserObservations> {
        self.observations.clone()
    }

    /// Bind and serve until [`Server::shutdown`] is called
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.listen).await?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        info!("User {} listening on {}", self.user_id, listener.local_addr()?);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(
            listener,
            router(self.user_id, self.sender.clone(), self.observations.clone()),
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

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use onionmesh_core::{Envelope, KeyPair, Node, NodeId};
    use onionmesh_net::{HttpTransport, StaticDirectory, StaticResolver, Transport, TransportError};
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    #[derive(Default)]
    struct EntryRecorder {
        sent: Mutex<Vec<NodeId>>,
    }

    #[async_trait]
    impl Transport for EntryRecorder {
        async fn forward(&self, to: NodeId, _envelope: &Envelope) -> Result<(), TransportError> {
            self.sent.lock().push(to);
            Ok(())
        }

        async fn deliver(&self, to: UserId, _message: &str) -> Result<(), TransportError> {
            Err(TransportError::Delivery {
                to,
                reason: "users never deliver".into(),
            })
        }
    }

    fn directory(count: u32) -> Arc<StaticDirectory> {
        let nodes = (1..=count)
            .map(|id| Node::new(NodeId(id), KeyPair::generate().unwrap().public))
            .collect();
        Arc::new(StaticDirectory(nodes))
    }

    fn app(nodes: u32) -> (Router, Arc<EntryRecorder>, Arc<UserObservations>) {
        let transport = Arc::new(EntryRecorder::default());
        let sender = Arc::new(Sender::new(directory(nodes), transport.clone()));
        let observations = Arc::new(UserObservations::new());
        (
            router(UserId(1), sender, observations.clone()),
            transport,
            observations,
        )
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_receive_updates_inbox() {
        let (app, _, observations) = app(3);

        let (status, body) = call(app.clone(), post("/message", json!({"message": "hi"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"result": "hi"}));
        assert_eq!(observations.last_received_message().as_deref(), Some("hi"));

        let (_, body) = call(app, get("/getLastReceivedMessage")).await;
        assert_eq!(body, json!({"result": "hi"}));
    }

    #[tokio::test]
    async fn test_send_message_transmits_to_entry() {
        let (app, transport, _) = app(3);

        let (status, _) = call(
            app.clone(),
            post("/sendMessage", json!({"message": "hello", "destinationUserId": 42})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(transport.sent.lock().len(), 1);

        let (_, body) = call(app, get("/getLastSentMessage")).await;
        assert_eq!(body, json!({"result": "hello"}));
    }

    #[tokio::test]
    async fn test_send_message_without_enough_nodes() {
        let (app, transport, observations) = app(2);

        let (status, body) = call(
            app,
            post("/sendMessage", json!({"message": "hello", "destinationUserId": 42})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("Insufficient nodes"));
        assert!(transport.sent.lock().is_empty());
        assert!(observations.last_sent_message().is_none());
    }

    #[tokio::test]
    async fn test_bad_bodies() {
        let (app, _, _) = app(3);
        let (status, _) = call(app.clone(), post("/sendMessage", json!({"message": "x"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(app, post("/message", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_served_endpoint_receives_delivery() {
        let sender = Arc::new(Sender::new(directory(3), Arc::new(EntryRecorder::default())));
        let server = Arc::new(Server::new("127.0.0.1:0".parse().unwrap(), UserId(7), sender));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let running = server.clone();
        let handle = tokio::spawn(async move { running.serve(listener).await });

        let transport =
            HttpTransport::new(StaticResolver::new().with_user(UserId(7), format!("http://{addr}")));
        transport.deliver(UserId(7), "over the wire").await.unwrap();
        assert_eq!(
            server.observations().last_received_message().as_deref(),
            Some("over the wire")
        );

        server.shutdown();
        handle.await.unwrap().unwrap();
    }
}
