//! Stub capabilities, a scripted transport and a canned authorization
//! provider for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::authorization::{AuthenticationBundle, AuthorizationFailure, AuthorizationProvider};
use crate::capability::{AuthenticationCapability, CapabilityError, CryptographicCapability};
use crate::identity::ProtocolSuiteId;
use crate::registry::{default_preference, ResolvedSuite, SuiteRegistry};
use crate::secure_memory::{SecretBytes, SecretKey};
use crate::transport::{TransportCapability, TransportError};
use crate::wire::{GATEWAY_ID_SIZE, HANDSHAKE_HELLO_SIZE, TIMESTAMP_SIZE};

pub(crate) const TEST_GATEWAY: &str = "ID_GATEWAY";
pub(crate) const TEST_OBJECT: &str = "ID_DEVICE0";
pub(crate) const TEST_OTP: &[u8] = b"otp-0123456789ab";
pub(crate) const TEST_SESSION_KEY: &[u8] = b"session-key-0001";

/// XOR with a SHA-256 keystream. Not a cipher, just reversible.
pub(crate) struct XorCipher {
    id: String,
    counter: AtomicU64,
}

impl XorCipher {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            counter: AtomicU64::new(0),
        }
    }

    fn apply(&self, input: &[u8], key: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        if key.is_empty() {
            return Err(CapabilityError::InvalidKey {
                algorithm: self.id.clone(),
            });
        }
        let stream = Sha256::digest(key);
        Ok(input
            .iter()
            .zip(stream.iter().cycle())
            .map(|(b, k)| b ^ k)
            .collect())
    }
}

impl CryptographicCapability for XorCipher {
    fn protocol_id(&self) -> &str {
        &self.id
    }

    fn secure_random_token(&self, size: usize) -> Result<Vec<u8>, CapabilityError> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let block = Sha256::digest(n.to_le_bytes());
        Ok(block.iter().copied().cycle().take(size).collect())
    }

    fn derive_key(&self, seed: &[u8]) -> SecretKey {
        SecretKey::new(self.id.clone(), Sha256::digest(seed).to_vec())
    }

    fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        self.apply(plaintext, key)
    }

    fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        self.apply(ciphertext, key)
    }
}

/// Truncated SHA-256 over `key ++ data`.
pub(crate) struct KeyedDigest {
    id: String,
    size: usize,
}

impl KeyedDigest {
    pub(crate) fn new(id: &str, size: usize) -> Self {
        Self {
            id: id.to_string(),
            size,
        }
    }
}

impl AuthenticationCapability for KeyedDigest {
    fn protocol_id(&self) -> &str {
        &self.id
    }

    fn sign(&self, data: &[u8], key: &SecretKey) -> Result<Vec<u8>, CapabilityError> {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hasher.update(data);
        Ok(hasher.finalize()[..self.size].to_vec())
    }

    fn verify(&self, data: &[u8], key: &SecretKey, signature: &[u8]) -> bool {
        self.sign(data, key)
            .map(|expected| expected == signature)
            .unwrap_or(false)
    }

    fn hash(&self, payload: &[u8]) -> Vec<u8> {
        Sha256::digest(payload)[..self.size].to_vec()
    }

    fn hash_size(&self) -> usize {
        self.size
    }
}

/// Ciphers `RC4`, `AES128`; MACs `HMAC_MD5` (16 bytes), `HMAC_SHA1` (20 bytes).
pub(crate) fn registry() -> SuiteRegistry {
    SuiteRegistry::new(
        vec![
            Arc::new(XorCipher::new("RC4")),
            Arc::new(XorCipher::new("AES128")),
        ],
        vec![
            Arc::new(KeyedDigest::new("HMAC_MD5", 16)),
            Arc::new(KeyedDigest::new("HMAC_SHA1", 20)),
        ],
        default_preference(),
    )
    .unwrap()
}

pub(crate) fn resolved_suite(id: &str) -> ResolvedSuite {
    registry()
        .resolve(&ProtocolSuiteId::parse(id).unwrap())
        .unwrap()
}

pub(crate) fn bundle(suite: &str) -> AuthenticationBundle {
    AuthenticationBundle {
        protocol_suite: suite.to_string(),
        otp: SecretBytes::from_slice(TEST_OTP),
        session_key: SecretBytes::from_slice(TEST_SESSION_KEY),
        encrypted_signed_auth_package: vec![0xAB; 40],
    }
}

pub(crate) struct MockProvider {
    outcome: Result<AuthenticationBundle, AuthorizationFailure>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockProvider {
    pub(crate) fn granting(bundle: AuthenticationBundle) -> Self {
        Self {
            outcome: Ok(bundle),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn refusing(reason: AuthorizationFailure) -> Self {
        Self {
            outcome: Err(reason),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl AuthorizationProvider for MockProvider {
    async fn authorize(
        &self,
        gateway_id: &str,
        object_id: &str,
    ) -> Result<AuthenticationBundle, AuthorizationFailure> {
        self.calls
            .lock()
            .push((gateway_id.to_string(), object_id.to_string()));
        self.outcome.clone()
    }
}

/// What the scripted device answers to the hello message.
pub(crate) enum HelloReply {
    /// Correctly signed `gatewayId ++ objectId ++ timestamp`.
    Valid,
    /// Valid signature with one bit flipped.
    Tampered,
    Missing,
    Fail(TransportError),
}

/// Per-step outcomes for [`MockTransport`]. Start from [`Script::happy`]
/// and override the step under test.
pub(crate) struct Script {
    pub connect: Result<bool, TransportError>,
    pub send_handshake_hello: Result<bool, TransportError>,
    pub handshake_response: Result<Option<Vec<u8>>, TransportError>,
    pub send_hello: Result<bool, TransportError>,
    pub hello_reply: HelloReply,
    pub write_data: Result<bool, TransportError>,
    pub read_error: Option<TransportError>,
    /// Written data frames are queued for the next read.
    pub echo: bool,
    /// Suite the device signs its hello response with.
    pub suite: ResolvedSuite,
}

impl Script {
    pub(crate) fn happy(suite: &str) -> Self {
        Self {
            connect: Ok(true),
            send_handshake_hello: Ok(true),
            handshake_response: Ok(Some(TEST_OBJECT.as_bytes().to_vec())),
            send_hello: Ok(true),
            hello_reply: HelloReply::Valid,
            write_data: Ok(true),
            read_error: None,
            echo: true,
            suite: resolved_suite(suite),
        }
    }
}

pub(crate) struct MockTransport {
    script: Script,
    calls: Mutex<Vec<&'static str>>,
    handshake_hello: Mutex<Option<Vec<u8>>>,
    hello_message: Mutex<Option<Vec<u8>>>,
    inbox: Mutex<VecDeque<Vec<u8>>>,
    written: Mutex<Vec<Vec<u8>>>,
}

impl MockTransport {
    pub(crate) fn new(script: Script) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
            handshake_hello: Mutex::new(None),
            hello_message: Mutex::new(None),
            inbox: Mutex::new(VecDeque::new()),
            written: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub(crate) fn handshake_hello(&self) -> Option<Vec<u8>> {
        self.handshake_hello.lock().clone()
    }

    pub(crate) fn hello_message(&self) -> Option<Vec<u8>> {
        self.hello_message.lock().clone()
    }

    pub(crate) fn written(&self) -> Vec<Vec<u8>> {
        self.written.lock().clone()
    }

    /// Queue a frame for the next `read_data`.
    pub(crate) fn push_frame(&self, frame: Vec<u8>) {
        self.inbox.lock().push_back(frame);
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().push(call);
    }

    fn signed_hello_response(&self) -> Option<Vec<u8>> {
        let handshake_hello = self.handshake_hello()?;
        let hello = self.hello_message()?;
        let sig_size = self.script.suite.auth.hash_size();
        let ts_end = hello.len().checked_sub(sig_size)?;
        let ts = hello.get(ts_end.checked_sub(TIMESTAMP_SIZE)?..ts_end)?;

        let mut expected = handshake_hello[HANDSHAKE_HELLO_SIZE - GATEWAY_ID_SIZE..].to_vec();
        expected.extend_from_slice(TEST_OBJECT.as_bytes());
        expected.extend_from_slice(ts);

        let key = self.script.suite.crypto.derive_key(TEST_OTP);
        self.script.suite.auth.sign(&expected, &key).ok()
    }
}

#[async_trait]
impl TransportCapability for MockTransport {
    async fn scan_devices(&self) -> Result<Vec<String>, TransportError> {
        self.record("scan_devices");
        Ok(vec!["AA:BB:CC:DD:EE:FF".to_string()])
    }

    async fn connect(&self, _device_id: &str) -> Result<bool, TransportError> {
        self.record("connect");
        self.script.connect.clone()
    }

    async fn disconnect(&self, _device_id: &str) {
        self.record("disconnect");
    }

    async fn send_handshake_hello(
        &self,
        _device_id: &str,
        frame: &[u8],
    ) -> Result<bool, TransportError> {
        self.record("send_handshake_hello");
        *self.handshake_hello.lock() = Some(frame.to_vec());
        self.script.send_handshake_hello.clone()
    }

    async fn read_handshake_response(
        &self,
        _device_id: &str,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        self.record("read_handshake_response");
        self.script.handshake_response.clone()
    }

    async fn send_hello_message(
        &self,
        _device_id: &str,
        frame: &[u8],
    ) -> Result<bool, TransportError> {
        self.record("send_hello_message");
        *self.hello_message.lock() = Some(frame.to_vec());
        self.script.send_hello.clone()
    }

    async fn read_hello_message_response(
        &self,
        _device_id: &str,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        self.record("read_hello_message_response");
        match &self.script.hello_reply {
            HelloReply::Valid => Ok(self.signed_hello_response()),
            HelloReply::Tampered => Ok(self.signed_hello_response().map(|mut sig| {
                sig[0] ^= 0x01;
                sig
            })),
            HelloReply::Missing => Ok(None),
            HelloReply::Fail(err) => Err(err.clone()),
        }
    }

    async fn read_data(&self, _device_id: &str) -> Result<Option<Vec<u8>>, TransportError> {
        self.record("read_data");
        if let Some(err) = &self.script.read_error {
            return Err(err.clone());
        }
        Ok(self.inbox.lock().pop_front())
    }

    async fn write_data(&self, _device_id: &str, frame: &[u8]) -> Result<bool, TransportError> {
        self.record("write_data");
        self.written.lock().push(frame.to_vec());
        if self.script.echo {
            self.inbox.lock().push_back(frame.to_vec());
        }
        self.script.write_data.clone()
    }
}
