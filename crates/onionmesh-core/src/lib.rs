//! OnionMesh Core Library
//!
//! This crate provides the cryptographic primitives, node identities and the
//! layered envelope wire format used by every OnionMesh service.
//!
//! # Modules
//!
//! - [`crypto`]: RSA-OAEP key wrapping and AES-256-GCM layer encryption
//! - [`types`]: Node identities, hop addresses and registry entries
//! - [`envelope`]: Envelope sealing and single-layer peeling
//! - [`error`]: Error types

pub mod crypto;
pub mod envelope;
pub mod error;
pub mod types;

pub use crypto::{KeyPair, PrivateKey, PublicKey, SymmetricKey};
pub use envelope::{Envelope, PlaintextLayer};
pub use error::{Error, Result};
pub use types::*;
