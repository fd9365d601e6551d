//! Layered envelope format
//!
//! ```text
//! envelope = encrypted_sym_key (256) || iv (12) || aes_gcm(layer) (n + 16)
//! layer    = hop_address (5) || inner_payload
//! ```
//!
//! `encrypted_sym_key` is RSA-OAEP over the base64 export of the hop's
//! symmetric key. `inner_payload` is either the next envelope or, at the exit
//! hop, the user's message.

use crate::crypto::{
    decrypt_asymmetric, decrypt_symmetric, encrypt_asymmetric, encrypt_symmetric, PrivateKey,
    PublicKey, SymmetricKey, IV_LEN, RSA_CIPHERTEXT_LEN,
};
use crate::error::{Error, Result};
use crate::types::HopAddress;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Shortest byte string that can be split into key and AEAD segments
pub const MIN_ENVELOPE_LEN: usize = RSA_CIPHERTEXT_LEN + IV_LEN;

/// Decrypted content of one layer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaintextLayer {
    pub next_hop: HopAddress,
    pub payload: Vec<u8>,
}

impl PlaintextLayer {
    pub fn new(next_hop: HopAddress, payload: Vec<u8>) -> Self {
        Self { next_hop, payload }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HopAddress::SIZE + self.payload.len());
        bytes.extend_from_slice(&self.next_hop.to_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let next_hop = HopAddress::from_bytes(bytes)?;
        Ok(Self {
            next_hop,
            payload: bytes[HopAddress::SIZE..].to_vec(),
        })
    }
}

/// One onion layer as it travels between hops
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope(Vec<u8>);

impl Envelope {
    /// Wrap raw bytes, rejecting anything too short to split
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < MIN_ENVELOPE_LEN {
            return Err(Error::InvalidEnvelope(format!(
                "{} bytes is shorter than the minimum {MIN_ENVELOPE_LEN}",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    /// Decode the base64 wire form
    pub fn from_base64(text: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| Error::InvalidEnvelope(format!("invalid base64: {e}")))?;
        Self::from_bytes(bytes)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encrypt one layer for the holder of `recipient`'s private key.
    ///
    /// A fresh symmetric key is generated for every call.
    pub fn seal(layer: &PlaintextLayer, recipient: &PublicKey) -> Result<Self> {
        let sym_key = SymmetricKey::generate();
        let aead = encrypt_symmetric(&layer.to_bytes(), &sym_key)?;
        let wrapped_key = encrypt_asymmetric(sym_key.to_base64().as_bytes(), recipient)?;

        let mut bytes = Vec::with_capacity(wrapped_key.len() + aead.len());
        bytes.extend_from_slice(&wrapped_key);
        bytes.extend_from_slice(&aead);
        Self::from_bytes(bytes)
    }

    /// Remove exactly one layer with our private key
    pub fn open(&self, key: &PrivateKey) -> Result<PlaintextLayer> {
        let (wrapped_key, aead) = self.0.split_at(RSA_CIPHERTEXT_LEN);

        let exported = decrypt_asymmetric(wrapped_key, key)?;
        let exported = std::str::from_utf8(&exported).map_err(|_| Error::Decryption)?;
        let sym_key = SymmetricKey::from_base64(exported).map_err(|_| Error::Decryption)?;

        let plaintext = decrypt_symmetric(aead, &sym_key)?;
        PlaintextLayer::from_bytes(&plaintext)
    }
}
