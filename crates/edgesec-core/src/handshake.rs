//! Gateway side of the EdgeSec handshake
//!
//! One attempt runs these steps strictly in order, with no internal retry:
//!
//! ```text
//! Idle → Connecting → HandshakeHelloSent → HandshakeResponseReceived
//!      → Authorizing → SuitesResolved → HelloMessageSent
//!      → HelloResponseReceived → Verified → Connected
//! ```
//!
//! Any step may end the attempt in `Failed`. Once the link is up, any session
//! the device already had is dropped, since the device restarts its side on
//! the handshake hello. The new session is inserted only after the device's
//! hello response verified, so a failed or cancelled attempt leaves no
//! session behind. OTPs are single use: a caller
//! that retries must start a new attempt, which fetches a fresh bundle.

use std::fmt;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::authorization::{AuthenticationBundle, AuthorizationProvider};
use crate::config::EngineConfig;
use crate::error::{EdgeSecError, TransportStep};
use crate::identity::{GatewayId, ProtocolSuiteId};
use crate::registry::{ResolvedSuite, SuiteRegistry};
use crate::secure_memory::SecretKey;
use crate::session::{SecureSession, SessionStore};
use crate::transport::{TransportCapability, TransportError};
use crate::validation::{sanitize_for_log, validate_frame_size, validate_handshake_response};
use crate::wire::{self, TIMESTAMP_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakeState {
    Idle,
    Connecting,
    HandshakeHelloSent,
    HandshakeResponseReceived,
    Authorizing,
    SuitesResolved,
    HelloMessageSent,
    HelloResponseReceived,
    Verified,
    Connected,
    Failed,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Wall-clock time spent in each step of one attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandshakeTimings {
    pub connect: Duration,
    pub send_handshake_hello: Duration,
    pub read_handshake_response: Duration,
    pub authorization: Duration,
    pub create_hello: Duration,
    pub send_hello: Duration,
    pub read_hello_response: Duration,
    pub verify: Duration,
}

impl HandshakeTimings {
    pub fn total(&self) -> Duration {
        self.connect
            + self.send_handshake_hello
            + self.read_handshake_response
            + self.authorization
            + self.create_hello
            + self.send_hello
            + self.read_hello_response
            + self.verify
    }
}

/// Outcome of a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeReport {
    pub device_id: String,
    pub object_id: String,
    pub protocol_suite: ProtocolSuiteId,
    pub timings: HandshakeTimings,
}

/// Per-attempt material: the resolved suite, the bundle and the timestamp
/// the hello carries. Dropped (and its secrets wiped) when the attempt ends.
struct HandshakeContext {
    suite: ResolvedSuite,
    bundle: AuthenticationBundle,
    timestamp: [u8; TIMESTAMP_SIZE],
    hello_key: SecretKey,
}

impl HandshakeContext {
    fn new(suite: ResolvedSuite, bundle: AuthenticationBundle, unix_secs: i64) -> Self {
        let hello_key = suite.crypto.derive_key(&bundle.otp);
        Self {
            suite,
            bundle,
            timestamp: wire::encode_timestamp(unix_secs),
            hello_key,
        }
    }

    /// `helloBody ++ sign(gatewayId ++ helloBody)` where
    /// `helloBody = encryptedSignedAuthPackage ++ timestamp`.
    fn hello_message(&self, gateway_id: &GatewayId) -> Result<Vec<u8>, EdgeSecError> {
        let mut body = self.bundle.encrypted_signed_auth_package.clone();
        body.extend_from_slice(&self.timestamp);

        let mut signed = gateway_id.as_bytes().to_vec();
        signed.extend_from_slice(&body);
        let signature = self.suite.auth.sign(&signed, &self.hello_key)?;

        body.extend_from_slice(&signature);
        Ok(body)
    }

    fn verify_response(&self, gateway_id: &GatewayId, object_id: &str, response: &[u8]) -> bool {
        let mut expected = gateway_id.as_bytes().to_vec();
        expected.extend_from_slice(object_id.as_bytes());
        expected.extend_from_slice(&self.timestamp);
        self.suite.auth.verify(&expected, &self.hello_key, response)
    }

    fn into_session(self, object_id: String) -> SecureSession {
        SecureSession::new(
            object_id,
            self.bundle.session_key,
            self.bundle.otp,
            self.suite,
        )
    }
}

pub(crate) fn sent(
    step: TransportStep,
    result: Result<bool, TransportError>,
) -> Result<(), EdgeSecError> {
    match result {
        Ok(true) => Ok(()),
        Ok(false) => Err(EdgeSecError::refused(step)),
        Err(cause) => Err(EdgeSecError::transport(step, cause)),
    }
}

pub(crate) fn received(
    step: TransportStep,
    result: Result<Option<Vec<u8>>, TransportError>,
) -> Result<Vec<u8>, EdgeSecError> {
    match result {
        Ok(Some(frame)) => Ok(frame),
        Ok(None) => Err(EdgeSecError::refused(step)),
        Err(cause) => Err(EdgeSecError::transport(step, cause)),
    }
}

struct Attempt<'a> {
    device_id: &'a str,
    log_id: String,
    state: HandshakeState,
    connected: bool,
    timings: HandshakeTimings,
}

impl<'a> Attempt<'a> {
    fn new(device_id: &'a str) -> Self {
        Self {
            device_id,
            log_id: sanitize_for_log(device_id),
            state: HandshakeState::Idle,
            connected: false,
            timings: HandshakeTimings::default(),
        }
    }

    fn enter(&mut self, state: HandshakeState) {
        self.state = state;
        debug!(device = %self.log_id, state = %state, "handshake step");
    }
}

/// Borrowed collaborators for one handshake attempt.
pub struct Handshake<'a> {
    pub gateway_id: &'a GatewayId,
    pub transport: &'a dyn TransportCapability,
    pub provider: &'a dyn AuthorizationProvider,
    pub registry: &'a SuiteRegistry,
    pub config: &'a EngineConfig,
}

impl Handshake<'_> {
    /// Authenticate `device_id` and install its session in `sessions`.
    pub async fn run(
        &self,
        device_id: &str,
        sessions: &SessionStore,
    ) -> Result<HandshakeReport, EdgeSecError> {
        let mut attempt = Attempt::new(device_id);

        match self.drive(&mut attempt, sessions).await {
            Ok((session, report)) => {
                sessions.insert(device_id, session);
                attempt.enter(HandshakeState::Connected);
                info!(
                    device = %attempt.log_id,
                    object = %sanitize_for_log(&report.object_id),
                    suite = %report.protocol_suite,
                    total_ms = report.timings.total().as_millis() as u64,
                    connect_ms = report.timings.connect.as_millis() as u64,
                    authorization_ms = report.timings.authorization.as_millis() as u64,
                    hello_ms = (report.timings.send_hello + report.timings.read_hello_response)
                        .as_millis() as u64,
                    "device authenticated"
                );
                Ok(report)
            }
            Err(err) => {
                let failed_at = attempt.state;
                attempt.enter(HandshakeState::Failed);
                if err.is_security_relevant() {
                    error!(
                        security = true,
                        device = %attempt.log_id,
                        after = %failed_at,
                        error = %err,
                        "handshake rejected"
                    );
                } else {
                    warn!(device = %attempt.log_id, after = %failed_at, error = %err, "handshake failed");
                }

                if attempt.connected && self.config.disconnect_on_failure {
                    self.transport.disconnect(device_id).await;
                }
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        attempt: &mut Attempt<'_>,
        sessions: &SessionStore,
    ) -> Result<(SecureSession, HandshakeReport), EdgeSecError> {
        let device_id = attempt.device_id;

        attempt.enter(HandshakeState::Connecting);
        let started = Instant::now();
        match self.transport.connect(device_id).await {
            Ok(true) => attempt.connected = true,
            Ok(false) => return Err(EdgeSecError::ServiceNotFound),
            Err(cause) => return Err(EdgeSecError::transport(TransportStep::Connect, cause)),
        }
        attempt.timings.connect = started.elapsed();
        if sessions.remove(device_id).is_some() {
            debug!(device = %attempt.log_id, "live session superseded");
        }

        let started = Instant::now();
        let hello = wire::handshake_hello(self.gateway_id.as_bytes());
        sent(
            TransportStep::SendHandshakeHello,
            self.transport.send_handshake_hello(device_id, &hello).await,
        )?;
        attempt.timings.send_handshake_hello = started.elapsed();
        attempt.enter(HandshakeState::HandshakeHelloSent);

        let started = Instant::now();
        let response = received(
            TransportStep::ReadHandshakeResponse,
            self.transport.read_handshake_response(device_id).await,
        )?;
        let object_id = validate_handshake_response(&response, self.config.max_frame_size)
            .map_err(EdgeSecError::MalformedHandshakeResponse)?;
        attempt.timings.read_handshake_response = started.elapsed();
        attempt.enter(HandshakeState::HandshakeResponseReceived);

        attempt.enter(HandshakeState::Authorizing);
        let started = Instant::now();
        let bundle = self
            .provider
            .authorize(self.gateway_id.as_str(), &object_id)
            .await
            .map_err(|reason| {
                warn!(
                    device = %attempt.log_id,
                    object = %sanitize_for_log(&object_id),
                    reason = %reason,
                    "authorization refused"
                );
                EdgeSecError::Authorization(reason)
            })?;
        attempt.timings.authorization = started.elapsed();

        let started = Instant::now();
        let unix_secs = Utc::now().timestamp();
        let suite = ProtocolSuiteId::parse(&bundle.protocol_suite)
            .ok()
            .and_then(|id| self.registry.resolve(&id).ok())
            .ok_or_else(|| EdgeSecError::UnsupportedSuite {
                suite: bundle.protocol_suite.clone(),
            })?;
        let context = HandshakeContext::new(suite, bundle, unix_secs);
        attempt.enter(HandshakeState::SuitesResolved);

        let hello = context.hello_message(self.gateway_id)?;
        attempt.timings.create_hello = started.elapsed();

        let started = Instant::now();
        sent(
            TransportStep::SendHelloMessage,
            self.transport.send_hello_message(device_id, &hello).await,
        )?;
        attempt.timings.send_hello = started.elapsed();
        attempt.enter(HandshakeState::HelloMessageSent);

        let started = Instant::now();
        let response = received(
            TransportStep::ReadHelloMessageResponse,
            self.transport.read_hello_message_response(device_id).await,
        )?;
        validate_frame_size(&response, self.config.max_frame_size, "hello_response")
            .map_err(EdgeSecError::MalformedFrame)?;
        attempt.timings.read_hello_response = started.elapsed();
        attempt.enter(HandshakeState::HelloResponseReceived);

        let started = Instant::now();
        if !context.verify_response(self.gateway_id, &object_id, &response) {
            return Err(EdgeSecError::InvalidHelloResponse);
        }
        attempt.timings.verify = started.elapsed();
        attempt.enter(HandshakeState::Verified);

        let report = HandshakeReport {
            device_id: device_id.to_string(),
            object_id: object_id.clone(),
            protocol_suite: context.suite.suite.clone(),
            timings: attempt.timings,
        };
        Ok((context.into_session(object_id), report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::AuthorizationFailure;
    use crate::test_support::{
        bundle, registry, HelloReply, MockProvider, MockTransport, Script, TEST_GATEWAY,
        TEST_OBJECT,
    };

    struct Fixture {
        gateway_id: GatewayId,
        registry: SuiteRegistry,
        config: EngineConfig,
        sessions: SessionStore,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                gateway_id: GatewayId::new(TEST_GATEWAY).unwrap(),
                registry: registry(),
                config: EngineConfig::new(TEST_GATEWAY),
                sessions: SessionStore::new(),
            }
        }

        async fn run(
            &self,
            transport: &MockTransport,
            provider: &MockProvider,
        ) -> Result<HandshakeReport, EdgeSecError> {
            Handshake {
                gateway_id: &self.gateway_id,
                transport,
                provider,
                registry: &self.registry,
                config: &self.config,
            }
            .run("AA:BB:CC:DD:EE:FF", &self.sessions)
            .await
        }
    }

    fn ok_provider() -> MockProvider {
        MockProvider::granting(bundle("RC4_HMAC_MD5"))
    }

    #[tokio::test]
    async fn successful_handshake_installs_session() {
        let fx = Fixture::new();
        let transport = MockTransport::new(Script::happy("RC4_HMAC_MD5"));
        let provider = ok_provider();

        let report = fx.run(&transport, &provider).await.unwrap();
        assert_eq!(report.object_id, TEST_OBJECT);
        assert_eq!(report.protocol_suite.as_str(), "RC4_HMAC_MD5");

        let session = fx.sessions.get("AA:BB:CC:DD:EE:FF").unwrap();
        assert_eq!(session.object_id(), TEST_OBJECT);
        assert_eq!(session.suite().suite.as_str(), "RC4_HMAC_MD5");

        assert_eq!(
            provider.calls(),
            vec![(TEST_GATEWAY.to_string(), TEST_OBJECT.to_string())]
        );
        assert_eq!(
            transport.calls(),
            vec![
                "connect",
                "send_handshake_hello",
                "read_handshake_response",
                "send_hello_message",
                "read_hello_message_response",
            ]
        );
    }

    #[tokio::test]
    async fn handshake_hello_is_version_then_gateway() {
        let fx = Fixture::new();
        let transport = MockTransport::new(Script::happy("RC4_HMAC_MD5"));
        fx.run(&transport, &ok_provider()).await.unwrap();

        let hello = transport.handshake_hello().unwrap();
        assert_eq!(&hello[..3], b"1.0");
        assert_eq!(&hello[3..], TEST_GATEWAY.as_bytes());
    }

    #[tokio::test]
    async fn hello_message_carries_package_timestamp_and_signature() {
        let fx = Fixture::new();
        let transport = MockTransport::new(Script::happy("RC4_HMAC_MD5"));
        fx.run(&transport, &ok_provider()).await.unwrap();

        let bundle = bundle("RC4_HMAC_MD5");
        let package = &bundle.encrypted_signed_auth_package;
        let hello = transport.hello_message().unwrap();
        // 16-byte signature from the stub MAC
        assert_eq!(hello.len(), package.len() + TIMESTAMP_SIZE + 16);
        assert_eq!(&hello[..package.len()], &package[..]);

        let ts: [u8; TIMESTAMP_SIZE] = hello[package.len()..package.len() + TIMESTAMP_SIZE]
            .try_into()
            .unwrap();
        let now = Utc::now().timestamp() as u32;
        assert!(now.abs_diff(wire::decode_timestamp(ts)) <= 5);
    }

    #[tokio::test]
    async fn connect_false_means_service_not_found() {
        let fx = Fixture::new();
        let mut script = Script::happy("RC4_HMAC_MD5");
        script.connect = Ok(false);
        let transport = MockTransport::new(script);

        let err = fx.run(&transport, &ok_provider()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to connect to device - security service not found"
        );
        assert_eq!(transport.calls(), vec!["connect"]);
    }

    #[tokio::test]
    async fn connect_error_is_step_qualified() {
        let fx = Fixture::new();
        let mut script = Script::happy("RC4_HMAC_MD5");
        script.connect = Err(TransportError::Unreachable("AA:BB:CC:DD:EE:FF".into()));
        let transport = MockTransport::new(script);

        let err = fx.run(&transport, &ok_provider()).await.unwrap_err();
        assert_eq!(err.transport_step(), Some(TransportStep::Connect));
        assert!(err.to_string().starts_with("Failed to connect to device: "));
    }

    #[tokio::test]
    async fn send_handshake_hello_refused() {
        let fx = Fixture::new();
        let mut script = Script::happy("RC4_HMAC_MD5");
        script.send_handshake_hello = Ok(false);
        let transport = MockTransport::new(script);

        let err = fx.run(&transport, &ok_provider()).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to send handshakeHello");
        // torn down after connecting
        assert_eq!(transport.calls().last(), Some(&"disconnect"));
    }

    #[tokio::test]
    async fn read_handshake_response_error_carries_cause() {
        let fx = Fixture::new();
        let mut script = Script::happy("RC4_HMAC_MD5");
        script.handshake_response = Err(TransportError::Device(
            "Device is not connected and authenticated".into(),
        ));
        let transport = MockTransport::new(script);

        let err = fx.run(&transport, &ok_provider()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to read handshakeHelloResponse: Device is not connected and authenticated"
        );
    }

    #[tokio::test]
    async fn short_handshake_response_is_malformed() {
        let fx = Fixture::new();
        let mut script = Script::happy("RC4_HMAC_MD5");
        script.handshake_response = Ok(Some(b"ID_DEV".to_vec()));
        let transport = MockTransport::new(script);
        let provider = ok_provider();

        let err = fx.run(&transport, &provider).await.unwrap_err();
        assert!(matches!(err, EdgeSecError::MalformedHandshakeResponse(_)));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn authorization_refusal() {
        let fx = Fixture::new();
        let transport = MockTransport::new(Script::happy("RC4_HMAC_MD5"));
        let provider = MockProvider::refusing(AuthorizationFailure::NotAuthorized);

        let err = fx.run(&transport, &provider).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to get authorization from Core");
        assert!(matches!(
            err,
            EdgeSecError::Authorization(AuthorizationFailure::NotAuthorized)
        ));
        assert!(fx.sessions.is_empty());
        assert!(!transport.calls().contains(&"send_hello_message"));
    }

    #[tokio::test]
    async fn unknown_suite_never_sends_hello() {
        let fx = Fixture::new();
        let transport = MockTransport::new(Script::happy("RC4_HMAC_MD5"));
        let provider = MockProvider::granting(bundle("RANDOM_PROTOCOL_SUITE"));

        let err = fx.run(&transport, &provider).await.unwrap_err();
        assert_eq!(err.to_string(), "Plugins not supported by smart object");
        assert!(err.is_security_relevant());
        assert!(!transport.calls().contains(&"send_hello_message"));
        assert!(fx.sessions.is_empty());
    }

    #[tokio::test]
    async fn unparseable_suite_is_unsupported() {
        let fx = Fixture::new();
        let transport = MockTransport::new(Script::happy("RC4_HMAC_MD5"));
        let provider = MockProvider::granting(bundle("RC4"));

        let err = fx.run(&transport, &provider).await.unwrap_err();
        assert!(matches!(err, EdgeSecError::UnsupportedSuite { .. }));
    }

    #[tokio::test]
    async fn send_hello_refused() {
        let fx = Fixture::new();
        let mut script = Script::happy("RC4_HMAC_MD5");
        script.send_hello = Ok(false);
        let transport = MockTransport::new(script);

        let err = fx.run(&transport, &ok_provider()).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to send helloMessage");
        assert_eq!(err.transport_step(), Some(TransportStep::SendHelloMessage));
    }

    #[tokio::test]
    async fn read_hello_response_error() {
        let fx = Fixture::new();
        let mut script = Script::happy("RC4_HMAC_MD5");
        script.hello_reply = HelloReply::Fail(TransportError::Device("Error".into()));
        let transport = MockTransport::new(script);

        let err = fx.run(&transport, &ok_provider()).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to read helloMessageResponse: Error");
        assert_eq!(
            err.transport_step(),
            Some(TransportStep::ReadHelloMessageResponse)
        );
    }

    #[tokio::test]
    async fn missing_hello_response_is_a_failure() {
        let fx = Fixture::new();
        let mut script = Script::happy("RC4_HMAC_MD5");
        script.hello_reply = HelloReply::Missing;
        let transport = MockTransport::new(script);

        let err = fx.run(&transport, &ok_provider()).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to read helloMessageResponse");
    }

    #[tokio::test]
    async fn bad_hello_response_signature_rejected() {
        let fx = Fixture::new();
        let mut script = Script::happy("RC4_HMAC_MD5");
        script.hello_reply = HelloReply::Tampered;
        let transport = MockTransport::new(script);

        let err = fx.run(&transport, &ok_provider()).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid HelloMessageResponse from device");
        assert!(err.is_security_relevant());
        assert!(fx.sessions.is_empty());
        assert_eq!(transport.calls().last(), Some(&"disconnect"));
    }

    #[tokio::test]
    async fn failure_keeps_link_when_cleanup_disabled() {
        let mut fx = Fixture::new();
        fx.config.disconnect_on_failure = false;
        let mut script = Script::happy("RC4_HMAC_MD5");
        script.hello_reply = HelloReply::Tampered;
        let transport = MockTransport::new(script);

        assert!(fx.run(&transport, &ok_provider()).await.is_err());
        assert!(!transport.calls().contains(&"disconnect"));
    }

    #[tokio::test]
    async fn second_handshake_replaces_session() {
        let fx = Fixture::new();
        let provider = ok_provider();

        let first = MockTransport::new(Script::happy("RC4_HMAC_MD5"));
        fx.run(&first, &provider).await.unwrap();
        let before = fx.sessions.get("AA:BB:CC:DD:EE:FF").unwrap();

        let second = MockTransport::new(Script::happy("RC4_HMAC_MD5"));
        fx.run(&second, &provider).await.unwrap();
        let after = fx.sessions.get("AA:BB:CC:DD:EE:FF").unwrap();

        assert_eq!(fx.sessions.len(), 1);
        assert!(!std::sync::Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn failed_rehandshake_drops_old_session() {
        let fx = Fixture::new();
        let first = MockTransport::new(Script::happy("RC4_HMAC_MD5"));
        fx.run(&first, &ok_provider()).await.unwrap();
        assert!(fx.sessions.contains("AA:BB:CC:DD:EE:FF"));

        let second = MockTransport::new(Script::happy("RC4_HMAC_MD5"));
        let err = fx
            .run(&second, &MockProvider::refusing(AuthorizationFailure::NotAuthorized))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to get authorization from Core");
        assert!(fx.sessions.is_empty());
        assert_eq!(second.calls().last(), Some(&"disconnect"));
    }

    #[tokio::test]
    async fn refused_connect_keeps_old_session() {
        let fx = Fixture::new();
        let first = MockTransport::new(Script::happy("RC4_HMAC_MD5"));
        fx.run(&first, &ok_provider()).await.unwrap();

        let mut script = Script::happy("RC4_HMAC_MD5");
        script.connect = Ok(false);
        let second = MockTransport::new(script);
        assert!(matches!(
            fx.run(&second, &ok_provider()).await,
            Err(EdgeSecError::ServiceNotFound)
        ));
        assert!(fx.sessions.contains("AA:BB:CC:DD:EE:FF"));
    }

    #[test]
    fn timings_total() {
        let timings = HandshakeTimings {
            connect: Duration::from_millis(10),
            authorization: Duration::from_millis(5),
            verify: Duration::from_millis(1),
            ..HandshakeTimings::default()
        };
        assert_eq!(timings.total(), Duration::from_millis(16));
    }
}
