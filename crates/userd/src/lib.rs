//! userd - OnionMesh user endpoint daemon
//!
//! A user both originates messages (choosing a circuit and wrapping the
//! onion) and receives plaintext deliveries from exit relays.

pub mod config;
pub mod inbox;
pub mod sender;
pub mod server;

pub use config::Config;
pub use inbox::UserObservations;
pub use sender::{SendError, Sender};
pub use server::Server;
