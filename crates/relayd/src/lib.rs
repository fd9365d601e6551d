//! relayd - OnionMesh relay daemon
//!
//! Each relay owns one long-lived key pair. For every inbound envelope it
//! removes exactly one layer, then forwards the inner envelope to the next
//! relay or delivers the plaintext to the addressed user.

pub mod config;
pub mod observe;
pub mod processor;
pub mod server;

pub use config::Config;
pub use observe::RelayObservations;
pub use processor::{RelayAction, RelayError, RelayProcessor, RelayStats};
pub use server::Server;
