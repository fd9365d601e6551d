//! Core OnionMesh types

use crate::crypto::PublicKey;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relay node identifier, assigned by the operator and registered once
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User endpoint identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Next-hop address carried at the front of every plaintext layer.
///
/// Encoded as a fixed-width token: one tag byte followed by the id as a
/// big-endian `u32`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HopAddress {
    /// Forward the inner envelope to another relay
    Relay(NodeId),
    /// Deliver the inner payload to a user inbox
    User(UserId),
}

impl HopAddress {
    pub const SIZE: usize = 5;

    const TAG_RELAY: u8 = b'R';
    const TAG_USER: u8 = b'U';

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let (tag, id) = match self {
            Self::Relay(NodeId(id)) => (Self::TAG_RELAY, *id),
            Self::User(UserId(id)) => (Self::TAG_USER, *id),
        };
        let mut bytes = [0u8; Self::SIZE];
        bytes[0] = tag;
        bytes[1..].copy_from_slice(&id.to_be_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(Error::InvalidEnvelope(format!(
                "address needs {} bytes, got {}",
                Self::SIZE,
                bytes.len()
            )));
        }
        let mut id = [0u8; 4];
        id.copy_from_slice(&bytes[1..Self::SIZE]);
        let id = u32::from_be_bytes(id);

        match bytes[0] {
            Self::TAG_RELAY => Ok(Self::Relay(NodeId(id))),
            Self::TAG_USER => Ok(Self::User(UserId(id))),
            tag => Err(Error::InvalidEnvelope(format!(
                "unknown address tag 0x{tag:02x}"
            ))),
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

impl fmt::Display for HopAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relay(id) => write!(f, "relay {id}"),
            Self::User(id) => write!(f, "user {id}"),
        }
    }
}

/// Registry entry: a relay and its persistent public key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "nodeId")]
    pub id: NodeId,
    #[serde(rename = "pubKey")]
    pub public_key: PublicKey,
}

impl Node {
    pub fn new(id: NodeId, public_key: PublicKey) -> Self {
        Self { id, public_key }
    }
}
