//! Registered objects and their provisioning secrets

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use edgesec_core::registry::default_preference;
use edgesec_core::validation::ValidationError;
use edgesec_core::{ConfigError, ProtocolSuiteId};
use serde::{Deserialize, Serialize};

/// Provisioning record of one smart object.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Shared secret mixed into the object's OTPs.
    pub auth_key: String,
    /// Key the auth package is encrypted under; only the object holds it.
    pub cipher_key: String,
    pub supported_suites: Vec<ProtocolSuiteId>,
    pub authorized_gateways: Vec<String>,
}

impl ObjectRecord {
    /// Fails on the first malformed suite id.
    pub fn new(
        auth_key: &str,
        cipher_key: &str,
        suites: &[&str],
        gateways: &[&str],
    ) -> Result<Self, ValidationError> {
        let supported_suites = suites
            .iter()
            .map(|s| ProtocolSuiteId::parse(s))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            auth_key: auth_key.to_string(),
            cipher_key: cipher_key.to_string(),
            supported_suites,
            authorized_gateways: gateways.iter().map(|g| g.to_string()).collect(),
        })
    }

    pub fn authorizes(&self, gateway_id: &str) -> bool {
        self.authorized_gateways.iter().any(|g| g == gateway_id)
    }
}

impl fmt::Debug for ObjectRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRecord")
            .field("auth_key", &"[REDACTED]")
            .field("cipher_key", &"[REDACTED]")
            .field("supported_suites", &self.supported_suites)
            .field("authorized_gateways", &self.authorized_gateways)
            .finish()
    }
}

/// Everything the authority knows, injected at construction.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityConfig {
    /// Authority-wide secret the auth package signature is keyed with.
    pub core_auth_key: String,
    #[serde(default = "default_preference")]
    pub suite_preference: Vec<ProtocolSuiteId>,
    #[serde(default)]
    pub objects: BTreeMap<String, ObjectRecord>,
}

impl AuthorityConfig {
    pub fn new(core_auth_key: impl Into<String>) -> Self {
        Self {
            core_auth_key: core_auth_key.into(),
            suite_preference: default_preference(),
            objects: BTreeMap::new(),
        }
    }

    pub fn with_object(mut self, object_id: impl Into<String>, record: ObjectRecord) -> Self {
        self.objects.insert(object_id.into(), record);
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Demo deployment: three objects the demo gateways may talk to and one
    /// they may not.
    pub fn demo() -> Result<Self, ValidationError> {
        let gateways = ["808DE88FC8TE", "02:00:00:00:00:00", "GATEWAY_ID"];

        Ok(Self::new("Kauth_core")
            .with_object(
                "ID_DEVICE0",
                ObjectRecord::new(
                    "Kauth_obj",
                    "Kcipher_obj",
                    &["RC4_HMAC_MD5", "RC4_HMAC_SHA1"],
                    &gateways,
                )?,
            )
            .with_object(
                "ID_DEVICE1",
                ObjectRecord::new(
                    "Kauth_Obj1",
                    "Kcipher_Obj1",
                    &["CHACHA20_HMAC_MD5", "CHACHA20_HMAC_SHA256"],
                    &gateways,
                )?,
            )
            .with_object(
                "ID_DEVICE2",
                ObjectRecord::new(
                    "Kauth_Obj2",
                    "Kcipher_Obj2",
                    &["RC4_HMAC_MD5", "CHACHA20_HMAC_SHA1"],
                    &["736DF76FC9KU", "LK9JD765JKO9"],
                )?,
            )
            .with_object(
                "ID_DEVICE3",
                ObjectRecord::new("Kauth_Obj3", "Kcipher_Obj3", &["RC4_HMAC_MD5"], &gateways)?,
            ))
    }
}

impl fmt::Debug for AuthorityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorityConfig")
            .field("core_auth_key", &"[REDACTED]")
            .field("suite_preference", &self.suite_preference)
            .field("objects", &self.objects)
            .finish()
    }
}
