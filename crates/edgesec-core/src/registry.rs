//! Protocol-suite registry
//!
//! Maps a suite id such as `RC4_HMAC_MD5` to the capability pair that speaks
//! it, and picks the preferred suite out of what a device supports.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::capability::{AuthenticationCapability, CryptographicCapability};
use crate::error::EdgeSecError;
use crate::identity::ProtocolSuiteId;

/// Suites in the order a gateway prefers them when nothing else is configured.
pub const DEFAULT_SUITE_PREFERENCE: &[&str] = &[
    "CHACHA20_HMAC_SHA256",
    "AES128_HMAC_MD5",
    "RC4_HMAC_SHA1",
    "RC4_HMAC_MD5",
    "CHACHA20_HMAC_SHA1",
    "CHACHA20_HMAC_MD5",
];

/// [`DEFAULT_SUITE_PREFERENCE`] as parsed ids.
pub fn default_preference() -> Vec<ProtocolSuiteId> {
    DEFAULT_SUITE_PREFERENCE
        .iter()
        .filter_map(|id| ProtocolSuiteId::parse(id).ok())
        .collect()
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Failed to get crypto plugin")]
    MissingCipher(String),

    #[error("Failed to get auth plugin")]
    MissingMac(String),
}

/// Both halves of a suite, ready to use.
#[derive(Clone)]
pub struct ResolvedSuite {
    pub suite: ProtocolSuiteId,
    pub crypto: Arc<dyn CryptographicCapability>,
    pub auth: Arc<dyn AuthenticationCapability>,
}

impl fmt::Debug for ResolvedSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedSuite")
            .field("suite", &self.suite)
            .field("crypto", &self.crypto.protocol_id())
            .field("auth", &self.auth.protocol_id())
            .finish()
    }
}

/// Registered capabilities plus the suite preference order.
///
/// Immutable once built; share it behind an `Arc`.
#[derive(Clone)]
pub struct SuiteRegistry {
    ciphers: HashMap<String, Arc<dyn CryptographicCapability>>,
    macs: HashMap<String, Arc<dyn AuthenticationCapability>>,
    preference: Vec<ProtocolSuiteId>,
}

impl SuiteRegistry {
    /// Build a registry. Both capability lists must be non-empty.
    ///
    /// When two capabilities share a protocol id the later one wins.
    pub fn new(
        crypto: Vec<Arc<dyn CryptographicCapability>>,
        auth: Vec<Arc<dyn AuthenticationCapability>>,
        preference: Vec<ProtocolSuiteId>,
    ) -> Result<Self, EdgeSecError> {
        if crypto.is_empty() {
            return Err(EdgeSecError::NoCryptoCapabilities);
        }
        if auth.is_empty() {
            return Err(EdgeSecError::NoAuthCapabilities);
        }

        let ciphers = crypto
            .into_iter()
            .map(|cap| (cap.protocol_id().to_string(), cap))
            .collect();
        let macs = auth
            .into_iter()
            .map(|cap| (cap.protocol_id().to_string(), cap))
            .collect();

        Ok(Self {
            ciphers,
            macs,
            preference,
        })
    }

    pub fn preference(&self) -> &[ProtocolSuiteId] {
        &self.preference
    }

    /// First suite in preference order that the device supports.
    ///
    /// Only the preference list is consulted; whether the suite resolves is
    /// checked separately by [`resolve`](Self::resolve).
    pub fn select_suite(&self, supported: &[ProtocolSuiteId]) -> Option<ProtocolSuiteId> {
        self.preference
            .iter()
            .find(|suite| supported.contains(suite))
            .cloned()
    }

    /// Look up both capabilities for `suite`. Never returns half a suite.
    pub fn resolve(&self, suite: &ProtocolSuiteId) -> Result<ResolvedSuite, RegistryError> {
        let crypto = self
            .ciphers
            .get(suite.cipher())
            .cloned()
            .ok_or_else(|| RegistryError::MissingCipher(suite.cipher().to_string()))?;
        let auth = self
            .macs
            .get(suite.mac())
            .cloned()
            .ok_or_else(|| RegistryError::MissingMac(suite.mac().to_string()))?;

        Ok(ResolvedSuite {
            suite: suite.clone(),
            crypto,
            auth,
        })
    }

    pub fn supports(&self, suite: &ProtocolSuiteId) -> bool {
        self.ciphers.contains_key(suite.cipher()) && self.macs.contains_key(suite.mac())
    }
}

impl fmt::Debug for SuiteRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ciphers: Vec<_> = self.ciphers.keys().collect();
        let mut macs: Vec<_> = self.macs.keys().collect();
        ciphers.sort();
        macs.sort();
        f.debug_struct("SuiteRegistry")
            .field("ciphers", &ciphers)
            .field("macs", &macs)
            .field("preference", &self.preference)
            .finish()
    }
}
