use thiserror::Error;

use crate::authorization::AuthorizationFailure;
use crate::capability::CapabilityError;
use crate::transport::TransportError;
use crate::validation::ValidationError;

/// Broad classification of an [`EdgeSecError`].
///
/// `Security` failures may indicate an active attacker and must be told apart
/// from ordinary I/O trouble in logs and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid setup; raised at initialization, never retried.
    Configuration,
    /// Connect/send/read failure on the transport.
    Transport,
    /// The authorization provider refused the gateway/object pair.
    Authorization,
    /// Malformed frames from the device.
    Protocol,
    /// Unsupported suite or a signature that does not verify.
    Security,
    /// Operation on a device without a live session.
    Session,
}

/// Transport round trip an error happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportStep {
    Connect,
    SendHandshakeHello,
    ReadHandshakeResponse,
    SendHelloMessage,
    ReadHelloMessageResponse,
    ReadData,
    WriteData,
}

impl std::fmt::Display for TransportStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let step = match self {
            Self::Connect => "connect to device",
            Self::SendHandshakeHello => "send handshakeHello",
            Self::ReadHandshakeResponse => "read handshakeHelloResponse",
            Self::SendHelloMessage => "send helloMessage",
            Self::ReadHelloMessageResponse => "read helloMessageResponse",
            Self::ReadData => "read data from device",
            Self::WriteData => "write data to device",
        };
        f.write_str(step)
    }
}

fn with_cause(cause: &Option<TransportError>) -> String {
    match cause {
        Some(err) => format!(": {err}"),
        None => String::new(),
    }
}

/// Errors surfaced by the EdgeSec engine.
#[derive(Debug, Error)]
pub enum EdgeSecError {
    #[error("Invalid gateway ID: should be of size :{expected}. actual size is: {actual}")]
    InvalidGatewayId { expected: usize, actual: usize },

    #[error("Invalid crypto plugin list. Should have at least one plugin")]
    NoCryptoCapabilities,

    #[error("Invalid auth plugin list. Should have at least one plugin")]
    NoAuthCapabilities,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The transport reached the device but it does not expose the EdgeSec service.
    #[error("Failed to connect to device - security service not found")]
    ServiceNotFound,

    /// A transport round trip failed. `cause` is `None` when the transport
    /// reported a plain negative result rather than an error.
    #[error("Failed to {step}{}", with_cause(.cause))]
    Transport {
        step: TransportStep,
        cause: Option<TransportError>,
    },

    #[error("Invalid handshakeHelloResponse from device: {0}")]
    MalformedHandshakeResponse(ValidationError),

    #[error("Invalid frame from device: {0}")]
    MalformedFrame(ValidationError),

    #[error("Failed to get authorization from Core")]
    Authorization(#[source] AuthorizationFailure),

    #[error("Plugins not supported by smart object")]
    UnsupportedSuite { suite: String },

    #[error("Invalid HelloMessageResponse from device")]
    InvalidHelloResponse,

    #[error("Failed to validate message signature")]
    InvalidSignature,

    #[error("Device not connected and authenticated")]
    NotConnected,

    #[error("capability failure: {0}")]
    Capability(#[from] CapabilityError),
}

impl EdgeSecError {
    pub(crate) fn transport(step: TransportStep, cause: TransportError) -> Self {
        Self::Transport {
            step,
            cause: Some(cause),
        }
    }

    pub(crate) fn refused(step: TransportStep) -> Self {
        Self::Transport { step, cause: None }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidGatewayId { .. }
            | Self::NoCryptoCapabilities
            | Self::NoAuthCapabilities
            | Self::InvalidConfig(_) => ErrorKind::Configuration,
            Self::ServiceNotFound | Self::Transport { .. } => ErrorKind::Transport,
            Self::MalformedHandshakeResponse(_) | Self::MalformedFrame(_) | Self::Capability(_) => {
                ErrorKind::Protocol
            }
            Self::Authorization(_) => ErrorKind::Authorization,
            Self::UnsupportedSuite { .. } | Self::InvalidHelloResponse | Self::InvalidSignature => {
                ErrorKind::Security
            }
            Self::NotConnected => ErrorKind::Session,
        }
    }

    /// True for rejections that may indicate an active attacker.
    pub fn is_security_relevant(&self) -> bool {
        self.kind() == ErrorKind::Security
    }

    /// Transport step this failure happened on, if any.
    pub fn transport_step(&self) -> Option<TransportStep> {
        match self {
            Self::ServiceNotFound => Some(TransportStep::Connect),
            Self::Transport { step, .. } => Some(*step),
            _ => None,
        }
    }
}
