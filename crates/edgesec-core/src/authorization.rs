//! Authorization provider boundary
//!
//! The trust decision for a gateway/object pair is delegated to a remote
//! authorization service. On approval it issues an [`AuthenticationBundle`]:
//! the suite to speak, the single-use OTP, the session key, and the auth
//! package only the object can open.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::secure_memory::SecretBytes;

/// Credentials for one connection attempt. Consumed by the handshake that
/// requested it and never reused.
#[derive(Clone)]
pub struct AuthenticationBundle {
    /// Suite id chosen by the provider, e.g. `RC4_HMAC_SHA1`. Not validated
    /// until the handshake resolves it.
    pub protocol_suite: String,
    pub otp: SecretBytes,
    pub session_key: SecretBytes,
    /// `encrypt(authPackage) ++ signature`, opaque to the gateway.
    pub encrypted_signed_auth_package: Vec<u8>,
}

impl fmt::Debug for AuthenticationBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationBundle")
            .field("protocol_suite", &self.protocol_suite)
            .field("otp", &self.otp)
            .field("session_key", &self.session_key)
            .field(
                "encrypted_signed_auth_package",
                &format_args!("{} bytes", self.encrypted_signed_auth_package.len()),
            )
            .finish()
    }
}

/// Why the provider refused to authorize.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthorizationFailure {
    #[error("Object is not registered in ContextNetCore")]
    NotRegistered,

    #[error("Gateway is not authorized to communicate with this object")]
    NotAuthorized,

    #[error("Object does not support any of the required protocol suites")]
    NoCommonSuite,

    /// The chosen suite has no cipher or MAC implementation on the provider.
    #[error("{0}")]
    CapabilityUnavailable(String),

    /// Any other refusal, reported verbatim.
    #[error("{0}")]
    Rejected(String),
}

/// Issues authentication bundles for gateway/object pairs.
#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    async fn authorize(
        &self,
        gateway_id: &str,
        object_id: &str,
    ) -> Result<AuthenticationBundle, AuthorizationFailure>;
}
