//! Error types for OnionMesh

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// OnionMesh core error types
#[derive(Debug, Error)]
pub enum Error {
    /// Key text is not valid base64 or not usable key material
    #[error("malformed key: {0}")]
    MalformedKey(String),

    /// Asymmetric plaintext exceeds the OAEP padding limit
    #[error("payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    /// Envelope or layer is truncated or structurally invalid
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// Wrong key, tampered ciphertext or authentication tag mismatch
    #[error("decryption failed")]
    Decryption,

    /// Encryption backend failure
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Key pair generation failure
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
}
