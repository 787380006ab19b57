//! Established sessions and the secure data pipeline
//!
//! A [`SecureSession`] exists only after a handshake reached `Connected`.
//! Outgoing data is `encrypt(sessionKey) ++ sign(deriveKey(otp))`; incoming
//! frames are verified first and decrypted only if the signature holds.
//!
//! Sessions live in a [`SessionStore`] shared by every task of the engine:
//! - one live session per device id, a newer one replaces the older
//! - the map lock is held only for the lookup, never across transport I/O

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::EdgeSecError;
use crate::registry::ResolvedSuite;
use crate::secure_memory::{SecretBytes, SecretKey};
use crate::validation::validate_signed_frame;

/// Per-device state after a successful handshake.
pub struct SecureSession {
    object_id: String,
    session_key: SecretBytes,
    otp: SecretBytes,
    suite: ResolvedSuite,
    signing_key: SecretKey,
    established_at: DateTime<Utc>,
}

impl SecureSession {
    pub fn new(
        object_id: String,
        session_key: SecretBytes,
        otp: SecretBytes,
        suite: ResolvedSuite,
    ) -> Self {
        let signing_key = suite.crypto.derive_key(&otp);
        Self {
            object_id,
            session_key,
            otp,
            suite,
            signing_key,
            established_at: Utc::now(),
        }
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn suite(&self) -> &ResolvedSuite {
        &self.suite
    }

    pub fn otp(&self) -> &SecretBytes {
        &self.otp
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    /// Encrypt and sign `data` into a `ciphertext ++ signature` frame.
    pub fn seal(&self, data: &[u8]) -> Result<Vec<u8>, EdgeSecError> {
        let mut frame = self.suite.crypto.encrypt(data, &self.session_key)?;
        let signature = self.suite.auth.sign(&frame, &self.signing_key)?;
        frame.extend_from_slice(&signature);
        Ok(frame)
    }

    /// Verify and decrypt a frame read from the device.
    ///
    /// A bad signature rejects the frame before any decryption.
    pub fn open(&self, frame: &[u8], max_frame_size: usize) -> Result<Vec<u8>, EdgeSecError> {
        let (ciphertext, signature) =
            validate_signed_frame(frame, self.suite.auth.hash_size(), max_frame_size)
                .map_err(EdgeSecError::MalformedFrame)?;

        if !self
            .suite
            .auth
            .verify(ciphertext, &self.signing_key, signature)
        {
            return Err(EdgeSecError::InvalidSignature);
        }

        Ok(self.suite.crypto.decrypt(ciphertext, &self.session_key)?)
    }
}

impl fmt::Debug for SecureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureSession")
            .field("object_id", &self.object_id)
            .field("suite", &self.suite.suite)
            .field("session_key", &self.session_key)
            .field("established_at", &self.established_at)
            .finish_non_exhaustive()
    }
}

/// Thread-safe map of device id to live session.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Arc<SecureSession>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `session` for `device_id`, returning the one it replaced.
    pub fn insert(&self, device_id: &str, session: SecureSession) -> Option<Arc<SecureSession>> {
        self.inner
            .write()
            .insert(device_id.to_string(), Arc::new(session))
    }

    /// Handle to the live session. Stays valid even if the session is
    /// removed or replaced afterwards.
    pub fn get(&self, device_id: &str) -> Option<Arc<SecureSession>> {
        self.inner.read().get(device_id).cloned()
    }

    /// Drop the session for `device_id`. Removing an absent entry is a no-op.
    pub fn remove(&self, device_id: &str) -> Option<Arc<SecureSession>> {
        self.inner.write().remove(device_id)
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.inner.read().contains_key(device_id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.len())
            .finish()
    }
}
