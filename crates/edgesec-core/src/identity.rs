//! Gateway identifiers and protocol-suite ids

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EdgeSecError;
use crate::validation::ValidationError;
use crate::wire::GATEWAY_ID_SIZE;

/// Identity this gateway presents to smart objects and the authorization
/// provider. Always exactly [`GATEWAY_ID_SIZE`] bytes once encoded.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct GatewayId {
    text: String,
    bytes: [u8; GATEWAY_ID_SIZE],
}

impl GatewayId {
    pub fn new(id: &str) -> Result<Self, EdgeSecError> {
        let bytes: [u8; GATEWAY_ID_SIZE] =
            id.as_bytes()
                .try_into()
                .map_err(|_| EdgeSecError::InvalidGatewayId {
                    expected: GATEWAY_ID_SIZE,
                    actual: id.len(),
                })?;
        Ok(Self {
            text: id.to_string(),
            bytes,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8; GATEWAY_ID_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for GatewayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GatewayId({})", self.text)
    }
}

impl fmt::Display for GatewayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// A protocol suite id of the form `<CIPHER>_<MAC>`, e.g. `RC4_HMAC_MD5`.
///
/// The MAC name is always two tokens, so a well-formed id splits on `_`
/// into exactly three non-empty parts.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProtocolSuiteId {
    id: String,
    split: usize,
}

impl ProtocolSuiteId {
    pub fn parse(id: &str) -> Result<Self, ValidationError> {
        let parts: Vec<&str> = id.split('_').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(ValidationError::InvalidFormat("protocol_suite".to_string()));
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ValidationError::InvalidCharacters(
                "protocol_suite".to_string(),
            ));
        }
        Ok(Self {
            id: id.to_string(),
            split: parts[0].len(),
        })
    }

    /// Cipher half, e.g. `RC4`.
    pub fn cipher(&self) -> &str {
        &self.id[..self.split]
    }

    /// MAC half, e.g. `HMAC_MD5`.
    pub fn mac(&self) -> &str {
        &self.id[self.split + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl FromStr for ProtocolSuiteId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProtocolSuiteId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProtocolSuiteId> for String {
    fn from(value: ProtocolSuiteId) -> Self {
        value.id
    }
}

impl fmt::Debug for ProtocolSuiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProtocolSuiteId({})", self.id)
    }
}

impl fmt::Display for ProtocolSuiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
