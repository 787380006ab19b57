use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::ProtocolSuiteId;
use crate::registry::default_preference;
use crate::wire::DEFAULT_MAX_FRAME_SIZE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Gateway-side engine settings.
///
/// ```
/// use edgesec_core::EngineConfig;
///
/// let config: EngineConfig =
///     serde_json::from_str(r#"{ "gateway_id": "ID_GATEWAY" }"#).unwrap();
/// assert!(config.disconnect_on_failure);
/// assert_eq!(config.max_frame_size, 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub gateway_id: String,
    /// Suites in descending preference.
    pub suite_preference: Vec<ProtocolSuiteId>,
    /// Tear the link down when a handshake fails after connecting.
    pub disconnect_on_failure: bool,
    /// Largest frame accepted from a device, in bytes.
    pub max_frame_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gateway_id: String::new(),
            suite_preference: default_preference(),
            disconnect_on_failure: true,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl EngineConfig {
    pub fn new(gateway_id: impl Into<String>) -> Self {
        Self {
            gateway_id: gateway_id.into(),
            ..Self::default()
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
