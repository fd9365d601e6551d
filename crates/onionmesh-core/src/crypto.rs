//! Cryptographic primitives for OnionMesh
//!
//! Two algorithms are used, each in one direction only:
//!
//! - RSA-OAEP (2048-bit modulus, SHA-256) wraps the per-hop symmetric key
//!   under the relay's long-lived public key.
//! - AES-256-GCM encrypts the layer itself. The IV is random per call and is
//!   prepended to the AEAD output.
//!
//! All text encodings are standard base64 over DER (SPKI for public keys,
//! PKCS#8 for private keys) or the raw key bytes for symmetric keys.

use crate::error::{Error, Result};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use std::fmt;

// =============================================================================
// PARAMETERS
// =============================================================================

/// RSA modulus size in bits
pub const RSA_MODULUS_BITS: usize = 2048;
/// Length of every RSA-OAEP ciphertext (one modulus)
pub const RSA_CIPHERTEXT_LEN: usize = RSA_MODULUS_BITS / 8;
/// Largest plaintext OAEP/SHA-256 accepts: `k - 2*hLen - 2`
pub const OAEP_MAX_PLAINTEXT: usize = RSA_CIPHERTEXT_LEN - 2 * 32 - 2;
/// AES-GCM nonce length
pub const IV_LEN: usize = 12;
/// AES-GCM authentication tag length
pub const TAG_LEN: usize = 16;
/// AES-256 key length
pub const SYMMETRIC_KEY_LEN: usize = 32;

/// Strict decode: standard alphabet only, no surrounding whitespace
fn decode_base64(text: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|e| Error::MalformedKey(format!("invalid base64: {e}")))
}

// =============================================================================
// ASYMMETRIC KEYS
// =============================================================================

/// RSA public key with its canonical SPKI encoding cached.
///
/// Two keys compare equal when their DER encodings are identical, which is
/// what the registry uses for uniqueness.
#[derive(Clone)]
pub struct PublicKey {
    inner: RsaPublicKey,
    der: Vec<u8>,
}

impl PublicKey {
    fn from_rsa(inner: RsaPublicKey) -> Result<Self> {
        if inner.size() != RSA_CIPHERTEXT_LEN {
            return Err(Error::MalformedKey(format!(
                "expected {RSA_MODULUS_BITS}-bit modulus, got {} bits",
                inner.size() * 8
            )));
        }
        let der = inner
            .to_public_key_der()
            .map_err(|e| Error::MalformedKey(e.to_string()))?
            .as_bytes()
            .to_vec();
        Ok(Self { inner, der })
    }

    /// Import from base64 SPKI DER
    pub fn from_base64(text: &str) -> Result<Self> {
        let der = decode_base64(text)?;
        let inner = RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| Error::MalformedKey(format!("not an RSA public key: {e}")))?;
        Self::from_rsa(inner)
    }

    /// Export as base64 SPKI DER
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.der)
    }

    /// Canonical DER bytes
    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    /// BLAKE3 digest of the DER encoding
    pub fn fingerprint(&self) -> [u8; 32] {
        *blake3::hash(&self.der).as_bytes()
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.fingerprint()[..8]))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_base64(&text).map_err(serde::de::Error::custom)
    }
}

/// RSA private key
#[derive(Clone)]
pub struct PrivateKey(RsaPrivateKey);

impl PrivateKey {
    /// Import from base64 PKCS#8 DER
    pub fn from_base64(text: &str) -> Result<Self> {
        let der = decode_base64(text)?;
        let inner = RsaPrivateKey::from_pkcs8_der(&der)
            .map_err(|e| Error::MalformedKey(format!("not an RSA private key: {e}")))?;
        if inner.size() != RSA_CIPHERTEXT_LEN {
            return Err(Error::MalformedKey(format!(
                "expected {RSA_MODULUS_BITS}-bit modulus, got {} bits",
                inner.size() * 8
            )));
        }
        Ok(Self(inner))
    }

    /// Export as base64 PKCS#8 DER
    pub fn to_base64(&self) -> Result<String> {
        let der = self
            .0
            .to_pkcs8_der()
            .map_err(|e| Error::MalformedKey(e.to_string()))?;
        Ok(STANDARD.encode(der.as_bytes()))
    }

    /// Derive the matching public key
    pub fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_rsa(self.0.to_public_key())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Long-lived relay key pair, generated once at startup
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}

impl KeyPair {
    /// Generate a new RSA-2048 key pair (public exponent 65537)
    pub fn generate() -> Result<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, RSA_MODULUS_BITS)
            .map_err(|e| Error::KeyGeneration(e.to_string()))?;
        let public = PublicKey::from_rsa(private.to_public_key())?;
        Ok(Self {
            public,
            private: PrivateKey(private),
        })
    }
}

/// Encrypt a short payload (a wrapped key) with RSA-OAEP/SHA-256
pub fn encrypt_asymmetric(plaintext: &[u8], key: &PublicKey) -> Result<Vec<u8>> {
    if plaintext.len() > OAEP_MAX_PLAINTEXT {
        return Err(Error::PayloadTooLarge {
            len: plaintext.len(),
            max: OAEP_MAX_PLAINTEXT,
        });
    }
    key.inner
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
        .map_err(|e| match e {
            rsa::Error::MessageTooLong => Error::PayloadTooLarge {
                len: plaintext.len(),
                max: OAEP_MAX_PLAINTEXT,
            },
            other => Error::Encryption(other.to_string()),
        })
}

/// Decrypt an RSA-OAEP/SHA-256 ciphertext
pub fn decrypt_asymmetric(ciphertext: &[u8], key: &PrivateKey) -> Result<Vec<u8>> {
    key.0
        .decrypt(Oaep::new::<Sha256>(), ciphertext)
        .map_err(|_| Error::Decryption)
}

// =============================================================================
// SYMMETRIC KEYS
// =============================================================================

/// Ephemeral AES-256-GCM key, one per hop per message
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_LEN]);

impl SymmetricKey {
    /// Generate fresh random key material
    pub fn generate() -> Self {
        let mut key = [0u8; SYMMETRIC_KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Import raw key bytes from base64
    pub fn from_base64(text: &str) -> Result<Self> {
        let raw = decode_base64(text)?;
        let key: [u8; SYMMETRIC_KEY_LEN] = raw.as_slice().try_into().map_err(|_| {
            Error::MalformedKey(format!(
                "symmetric key must be {SYMMETRIC_KEY_LEN} bytes, got {}",
                raw.len()
            ))
        })?;
        Ok(Self(key))
    }

    /// Export raw key bytes as base64
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Encrypt with AES-256-GCM under a fresh random IV; returns `iv || ciphertext || tag`
pub fn encrypt_symmetric(plaintext: &[u8], key: &SymmetricKey) -> Result<Vec<u8>> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let ciphertext = key
        .cipher()
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| Error::Encryption("AES-GCM seal failed".into()))?;

    let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt `iv || ciphertext || tag` produced by [`encrypt_symmetric`]
pub fn decrypt_symmetric(iv_ciphertext: &[u8], key: &SymmetricKey) -> Result<Vec<u8>> {
    if iv_ciphertext.len() < IV_LEN {
        return Err(Error::InvalidEnvelope(format!(
            "ciphertext of {} bytes has no room for a {IV_LEN}-byte IV",
            iv_ciphertext.len()
        )));
    }
    let (iv, ciphertext) = iv_ciphertext.split_at(IV_LEN);
    key.cipher()
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| Error::Decryption)
}
