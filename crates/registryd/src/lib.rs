//! registryd - OnionMesh node registry daemon
//!
//! This daemon provides:
//! - The directory of relay ids and their long-lived public keys
//! - Atomic registration with id and key uniqueness
//! - The HTTP surface senders and relays talk to

pub mod config;
pub mod registry;
pub mod server;

pub use config::Config;
pub use registry::{NodeRegistry, RegistryError};
pub use server::Server;
