//! Networking layer for OnionMesh
//!
//! This crate provides:
//! - Path selection and nested envelope construction
//! - JSON request/response bodies shared by every service
//! - Transport and node directory traits with HTTP clients
//! - Address resolution from node/user ids to endpoints

pub mod circuit;
pub mod directory;
pub mod resolver;
pub mod transport;
pub mod wire;

pub use circuit::{Circuit, CircuitBuilder, CircuitError, FixedPath, PathSelector, RandomPath};
pub use directory::{NodeDirectory, RegistryClient, StaticDirectory};
pub use resolver::{AddressResolver, PortMap, StaticResolver};
pub use transport::{HttpTransport, Transport, TransportError};
