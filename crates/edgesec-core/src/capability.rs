//! Cryptographic and authentication capabilities
//!
//! **Stable extension points for algorithm plugins.**
//!
//! A protocol suite `<CIPHER>_<MAC>` is spoken by pairing one
//! [`CryptographicCapability`] (keyed by its cipher name, e.g. `RC4`) with
//! one [`AuthenticationCapability`] (keyed by its two-token MAC name, e.g.
//! `HMAC_MD5`). The engine only ever reaches algorithms through these
//! traits and picks implementations by protocol id through the
//! [`SuiteRegistry`](crate::registry::SuiteRegistry).
//!
//! ## Contract
//!
//! - Implementations are stateless and reentrant. One instance is shared by
//!   every session negotiated on the same suite.
//! - `protocol_id` is constant for the lifetime of the instance.
//! - Nothing here may log key material.

use thiserror::Error;

use crate::secure_memory::SecretKey;

/// Failure inside an algorithm plugin.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CapabilityError {
    /// The OS random source failed.
    #[error("secure random source unavailable: {0}")]
    Random(String),

    /// The key is not usable by this algorithm.
    #[error("invalid key for {algorithm}")]
    InvalidKey { algorithm: String },

    #[error("encryption failed")]
    Encrypt,

    /// Ciphertext is truncated or fails its integrity check.
    #[error("decryption failed")]
    Decrypt,
}

/// Cipher side of a protocol suite.
///
/// # Example
///
/// ```ignore
/// struct Rc4;
///
/// impl CryptographicCapability for Rc4 {
///     fn protocol_id(&self) -> &str { "RC4" }
///     // ...
/// }
/// ```
pub trait CryptographicCapability: Send + Sync {
    /// Cipher name this plugin implements (first token of a suite id).
    fn protocol_id(&self) -> &str;

    /// `size` bytes from a cryptographically secure source.
    ///
    /// Must return exactly `size` bytes; the handshake treats any other
    /// length as a protocol violation.
    fn secure_random_token(&self, size: usize) -> Result<Vec<u8>, CapabilityError>;

    /// Derive a key from seed material (an OTP, a random seed, a shared secret).
    ///
    /// Deterministic: both ends derive the same key from the same seed.
    fn derive_key(&self, seed: &[u8]) -> SecretKey;

    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CapabilityError>;

    fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, CapabilityError>;
}

/// MAC side of a protocol suite.
pub trait AuthenticationCapability: Send + Sync {
    /// Two-token MAC name this plugin implements (e.g. `HMAC_SHA1`).
    fn protocol_id(&self) -> &str;

    /// Keyed signature over `data`. Its length is always [`hash_size`](Self::hash_size).
    fn sign(&self, data: &[u8], key: &SecretKey) -> Result<Vec<u8>, CapabilityError>;

    /// Check `signature` over `data`.
    ///
    /// # Contract
    ///
    /// - MUST compare in constant time
    /// - MUST return false (not panic) for signatures of the wrong length
    fn verify(&self, data: &[u8], key: &SecretKey, signature: &[u8]) -> bool;

    /// Unkeyed digest of `payload`.
    fn hash(&self, payload: &[u8]) -> Vec<u8>;

    /// Size in bytes of both [`hash`](Self::hash) output and signatures.
    fn hash_size(&self) -> usize;
}
