//! JSON bodies exchanged between services
//!
//! Field names follow the camelCase HTTP surface. Binary artifacts travel as
//! base64 text inside these bodies.

use onionmesh_core::{HopAddress, Node, NodeId, UserId};
use serde::{Deserialize, Serialize};

/// Literal body of every `GET /status`
pub const STATUS_LIVE: &str = "live";

/// `POST /message` on relays and users
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

/// `POST /sendMessage` on users
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody {
    pub message: String,
    pub destination_user_id: UserId,
}

/// `POST /registerNode` on the registry.
///
/// The key stays as text here so the registry can report malformed keys
/// itself instead of failing JSON extraction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterNodeBody {
    pub node_id: NodeId,
    pub pub_key: String,
}

/// `201` response to `POST /registerNode`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredBody {
    pub message: String,
    pub node: Node,
}

/// `GET /getNodeRegistry`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRegistryBody {
    pub nodes: Vec<Node>,
}

/// Generic `{ "result": ... }` wrapper used by message and debug routes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultBody<T> {
    pub result: T,
}

impl<T> ResultBody<T> {
    pub fn new(result: T) -> Self {
        Self { result }
    }
}

/// Error response for any failed request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl ToString) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

/// `GET /getLastMessageDestination` on relays
pub type DestinationBody = ResultBody<Option<HopAddress>>;
