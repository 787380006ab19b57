//! `RC4` cipher capability
//!
//! Wire layout: `[ nonce (16 bytes) | keystream ^ plaintext ]`.
//! Each message is keyed with `SHA-256(nonce ++ key)` so no two messages
//! share a keystream, and the first 768 keystream bytes are discarded.
//! RC4 carries no integrity of its own; EdgeSec frames are always signed.

use edgesec_core::capability::CapabilityError;
use edgesec_core::{CryptographicCapability, SecretKey};
use rc4::consts::U32;
use rc4::{KeyInit, Rc4, StreamCipher};
use sha2::{Digest, Sha256};

use crate::random_bytes;

pub const PROTOCOL_ID: &str = "RC4";

const NONCE_SIZE: usize = 16;
const DROP: usize = 768;

#[derive(Debug, Clone, Copy, Default)]
pub struct Rc4Cipher;

impl Rc4Cipher {
    fn keystream(key: &[u8], nonce: &[u8]) -> Result<Rc4<U32>, CapabilityError> {
        if key.is_empty() {
            return Err(CapabilityError::InvalidKey {
                algorithm: PROTOCOL_ID.to_string(),
            });
        }
        let mut hasher = Sha256::new();
        hasher.update(nonce);
        hasher.update(key);
        let digest = hasher.finalize();

        let mut rc4 =
            Rc4::<U32>::new_from_slice(&digest).map_err(|_| CapabilityError::InvalidKey {
                algorithm: PROTOCOL_ID.to_string(),
            })?;
        rc4.apply_keystream(&mut [0u8; DROP]);
        Ok(rc4)
    }
}

impl CryptographicCapability for Rc4Cipher {
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
        let nonce = random_bytes(NONCE_SIZE)?;
        let mut rc4 = Self::keystream(key, &nonce)?;

        let mut out = nonce;
        let start = out.len();
        out.extend_from_slice(plaintext);
        rc4.apply_keystream(&mut out[start..]);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        if ciphertext.len() < NONCE_SIZE {
            return Err(CapabilityError::Decrypt);
        }
        let (nonce, body) = ciphertext.split_at(NONCE_SIZE);
        let mut rc4 = Self::keystream(key, nonce)?;

        let mut plaintext = body.to_vec();
        rc4.apply_keystream(&mut plaintext);
        Ok(plaintext)
    }
}
