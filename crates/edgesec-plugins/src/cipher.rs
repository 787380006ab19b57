//! `CHACHA20` cipher capability
//!
//! ChaCha20-Poly1305 with a fresh random nonce per message.
//! Wire layout: `[ nonce (12 bytes) | ciphertext | tag (16 bytes) ]`.
//!
//! Key material of any length is compressed with SHA-256 into the 256-bit
//! AEAD key, so per-object secrets and derived session keys are both usable.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use edgesec_core::capability::CapabilityError;
use edgesec_core::{CryptographicCapability, SecretKey};
use sha2::{Digest, Sha256};

use crate::random_bytes;

pub const PROTOCOL_ID: &str = "CHACHA20";

const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, Default)]
pub struct ChaCha20Cipher;

impl ChaCha20Cipher {
    fn aead(key: &[u8]) -> Result<ChaCha20Poly1305, CapabilityError> {
        if key.is_empty() {
            return Err(CapabilityError::InvalidKey {
                algorithm: PROTOCOL_ID.to_string(),
            });
        }
        let digest = Sha256::digest(key);
        ChaCha20Poly1305::new_from_slice(&digest).map_err(|_| CapabilityError::InvalidKey {
            algorithm: PROTOCOL_ID.to_string(),
        })
    }
}

impl CryptographicCapability for ChaCha20Cipher {
    fn protocol_id(&self) -> &str {
        PROTOCOL_ID
    }

    fn secure_random_token(&self, size: usize) -> Result<Vec<u8>, CapabilityError> {
        random_bytes(size)
    }

    fn derive_key(&self, seed: &[u8]) -> SecretKey {
        SecretKey::new(PROTOCOL_ID, Sha256::digest(seed).to_vec())
    }

    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        let cipher = Self::aead(key)?;
        let nonce = random_bytes(NONCE_SIZE)?;

        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CapabilityError::Encrypt)?;

        let mut out = nonce;
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CapabilityError::Decrypt);
        }
        let cipher = Self::aead(key)?;
        let (nonce, sealed) = ciphertext.split_at(NONCE_SIZE);

        cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CapabilityError::Decrypt)
    }
}
