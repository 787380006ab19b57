//! JSON form of an authentication bundle, for providers reached over a
//! network link. Byte fields travel as hex.

use edgesec_core::{AuthenticationBundle, SecretBytes};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("malformed authorization response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("field '{field}' is not valid hex")]
    Hex { field: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationResponse {
    pub otp: String,
    pub session_key: String,
    pub authentication_package: String,
    pub protocol_suite: String,
}

fn decode(field: &'static str, value: &str) -> Result<Vec<u8>, ResponseError> {
    hex::decode(value).map_err(|_| ResponseError::Hex { field })
}

impl AuthorizationResponse {
    pub fn to_json(&self) -> Result<String, ResponseError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, ResponseError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn into_bundle(self) -> Result<AuthenticationBundle, ResponseError> {
        Ok(AuthenticationBundle {
            otp: SecretBytes::new(decode("otp", &self.otp)?),
            session_key: SecretBytes::new(decode("sessionKey", &self.session_key)?),
            encrypted_signed_auth_package: decode(
                "authenticationPackage",
                &self.authentication_package,
            )?,
            protocol_suite: self.protocol_suite,
        })
    }
}

impl From<&AuthenticationBundle> for AuthorizationResponse {
    fn from(bundle: &AuthenticationBundle) -> Self {
        Self {
            otp: hex::encode(bundle.otp.as_slice()),
            session_key: hex::encode(bundle.session_key.as_slice()),
            authentication_package: hex::encode(&bundle.encrypted_signed_auth_package),
            protocol_suite: bundle.protocol_suite.clone(),
        }
    }
}
