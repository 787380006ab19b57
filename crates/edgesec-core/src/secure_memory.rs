//! Zeroizing containers for handshake secrets
//!
//! OTPs, session keys and keys derived from them live in these wrappers so
//! that they are wiped when a session is dropped or a handshake is
//! abandoned, and so that they never end up in log output.

use std::fmt;
use std::ops::Deref;
use zeroize::Zeroize;

/// Secret byte material (OTP, session key, per-object cipher keys).
///
/// # Example
/// ```
/// use edgesec_core::secure_memory::SecretBytes;
///
/// let otp = SecretBytes::new(vec![1, 2, 3, 4]);
/// assert_eq!(otp.len(), 4);
/// assert!(format!("{otp:?}").contains("REDACTED"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct SecretBytes {
    data: Vec<u8>,
}

impl SecretBytes {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn from_slice(slice: &[u8]) -> Self {
        Self {
            data: slice.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Explicitly zero the contents
    pub fn zero(&mut self) {
        self.data.zeroize();
    }
}

impl Deref for SecretBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for SecretBytes {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl Drop for SecretBytes {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

// Prevent accidentally printing secrets
impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes([REDACTED {} bytes])", self.data.len())
    }
}

/// A key produced by a cryptographic capability's key derivation.
///
/// Carries the protocol id of the capability that derived it, the way a
/// JCA `SecretKeySpec` carries its algorithm name.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey {
    algorithm: String,
    material: SecretBytes,
}

impl SecretKey {
    pub fn new(algorithm: impl Into<String>, material: Vec<u8>) -> Self {
        Self {
            algorithm: algorithm.into(),
            material: SecretBytes::new(material),
        }
    }

    /// Protocol id of the capability that derived this key.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.material.as_slice()
    }

    /// Consume the key, keeping only the zeroizing byte material.
    pub fn into_bytes(self) -> SecretBytes {
        self.material
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SecretKey<{}>([REDACTED {} bytes])",
            self.algorithm,
            self.material.len()
        )
    }
}
