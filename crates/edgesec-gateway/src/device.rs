//! Responder side of the protocol, played by a simulated smart object
//!
//! The object knows only its own provisioning: its id, the cipher key the
//! authority encrypts its auth packages under, optionally the authority's
//! signing secret, and the suites it speaks. It learns the OTP and session
//! key from the auth package inside the gateway's hello message.

use std::collections::VecDeque;
use std::sync::Arc;

use edgesec_authority::ObjectRecord;
use edgesec_core::registry::ResolvedSuite;
use edgesec_core::wire::{HANDSHAKE_HELLO_SIZE, PROTOCOL_VERSION, PROTOCOL_VERSION_SIZE, TIMESTAMP_SIZE};
use edgesec_core::{
    AuthenticationCapability, CryptographicCapability, EdgeSecError, SecretBytes, SecureSession,
    SuiteRegistry,
};
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Provisioned identity and behaviour switches of one simulated object.
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub object_id: String,
    pub cipher_key: SecretBytes,
    /// When set, the auth package signature is checked before opening it.
    pub core_auth_key: Option<SecretBytes>,
    /// False simulates a device without the EdgeSec service.
    pub has_service: bool,
    /// Corrupt the hello response signature.
    pub tamper_hello_response: bool,
}

impl DeviceProfile {
    pub fn new(object_id: impl Into<String>, cipher_key: &[u8]) -> Self {
        Self {
            object_id: object_id.into(),
            cipher_key: SecretBytes::from_slice(cipher_key),
            core_auth_key: None,
            has_service: true,
            tamper_hello_response: false,
        }
    }

    pub fn with_core_key(mut self, core_auth_key: &[u8]) -> Self {
        self.core_auth_key = Some(SecretBytes::from_slice(core_auth_key));
        self
    }
}

#[derive(Default)]
struct Link {
    gateway_id: Option<Vec<u8>>,
    hello_response: Option<Vec<u8>>,
    session: Option<SecureSession>,
    outbox: VecDeque<Vec<u8>>,
}

pub struct SimulatedDevice {
    profile: DeviceProfile,
    registry: SuiteRegistry,
    link: Mutex<Link>,
}

impl SimulatedDevice {
    /// `registry` lists the suites the object speaks, in its own preference order.
    pub fn new(profile: DeviceProfile, registry: SuiteRegistry) -> Self {
        Self {
            profile,
            registry,
            link: Mutex::new(Link::default()),
        }
    }

    /// Build an object from the authority's provisioning record.
    pub fn provision(
        object_id: &str,
        record: &ObjectRecord,
        core_auth_key: &str,
        crypto: Vec<Arc<dyn CryptographicCapability>>,
        auth: Vec<Arc<dyn AuthenticationCapability>>,
    ) -> Result<Self, EdgeSecError> {
        let registry = SuiteRegistry::new(crypto, auth, record.supported_suites.clone())?;
        let profile = DeviceProfile::new(object_id, record.cipher_key.as_bytes())
            .with_core_key(core_auth_key.as_bytes());
        Ok(Self::new(profile, registry))
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn object_id(&self) -> &str {
        &self.profile.object_id
    }

    pub fn has_service(&self) -> bool {
        self.profile.has_service
    }

    pub fn is_authenticated(&self) -> bool {
        self.link.lock().session.is_some()
    }

    /// Drop all link state, as on a radio disconnect.
    pub fn reset(&self) {
        *self.link.lock() = Link::default();
    }

    /// Queue a message from the object to the gateway.
    pub fn send(&self, data: &[u8]) -> Result<(), EdgeSecError> {
        let mut link = self.link.lock();
        let session = link.session.as_ref().ok_or(EdgeSecError::NotConnected)?;
        let frame = session.seal(data)?;
        link.outbox.push_back(frame);
        Ok(())
    }

    pub(crate) fn on_handshake_hello(&self, frame: &[u8]) -> bool {
        if frame.len() != HANDSHAKE_HELLO_SIZE || &frame[..PROTOCOL_VERSION_SIZE] != PROTOCOL_VERSION
        {
            warn!(object = %self.profile.object_id, "unsupported handshake hello");
            return false;
        }
        let mut link = self.link.lock();
        *link = Link::default();
        link.gateway_id = Some(frame[PROTOCOL_VERSION_SIZE..].to_vec());
        true
    }

    pub(crate) fn handshake_response(&self) -> Option<Vec<u8>> {
        let link = self.link.lock();
        link.gateway_id
            .as_ref()
            .map(|_| self.profile.object_id.as_bytes().to_vec())
    }

    /// Check the gateway's hello and prepare the answer. The write itself is
    /// always accepted; a rejected hello simply gets no response.
    pub(crate) fn on_hello_message(&self, frame: &[u8]) -> bool {
        let mut link = self.link.lock();
        let Some(gateway_id) = link.gateway_id.clone() else {
            return false;
        };

        let accepted = self.registry.preference().iter().find_map(|suite| {
            let resolved = self.registry.resolve(suite).ok()?;
            self.answer_hello(&resolved, &gateway_id, frame)
        });

        match accepted {
            Some((response, session)) => {
                debug!(
                    object = %self.profile.object_id,
                    suite = %session.suite().suite,
                    response = %hex::encode(&response),
                    "hello accepted"
                );
                link.hello_response = Some(response);
                link.session = Some(session);
            }
            None => {
                warn!(object = %self.profile.object_id, "hello message rejected");
                link.hello_response = None;
                link.session = None;
            }
        }
        true
    }

    pub(crate) fn hello_response(&self) -> Option<Vec<u8>> {
        self.link.lock().hello_response.take()
    }

    /// Open a frame from the gateway and echo its plaintext back sealed.
    pub(crate) fn on_data(&self, frame: &[u8]) -> Result<(), EdgeSecError> {
        let mut link = self.link.lock();
        let session = link.session.as_ref().ok_or(EdgeSecError::NotConnected)?;
        let data = session.open(frame, usize::MAX)?;
        let echo = session.seal(&data)?;
        link.outbox.push_back(echo);
        Ok(())
    }

    pub(crate) fn next_frame(&self) -> Option<Vec<u8>> {
        self.link.lock().outbox.pop_front()
    }

    /// Hello layout: `sealed ++ coreSig ++ timestamp ++ gatewaySig`, with
    /// both signatures `hash_size` long.
    fn answer_hello(
        &self,
        suite: &ResolvedSuite,
        gateway_id: &[u8],
        frame: &[u8],
    ) -> Option<(Vec<u8>, SecureSession)> {
        let mac_size = suite.auth.hash_size();

        let (body, signature) = frame.split_at(frame.len().checked_sub(mac_size)?);
        let (package, timestamp) = body.split_at(body.len().checked_sub(TIMESTAMP_SIZE)?);
        let (sealed, core_signature) = package.split_at(package.len().checked_sub(mac_size)?);

        if let Some(core_auth_key) = &self.profile.core_auth_key {
            let core_key = suite.crypto.derive_key(core_auth_key);
            if !suite.auth.verify(sealed, &core_key, core_signature) {
                return None;
            }
        }

        let opened = SecretBytes::new(
            suite
                .crypto
                .decrypt(sealed, &self.profile.cipher_key)
                .ok()?,
        );
        if opened.len() <= mac_size {
            return None;
        }
        let otp = SecretBytes::from_slice(&opened[..mac_size]);
        let session_key = SecretBytes::from_slice(&opened[mac_size..]);
        let hello_key = suite.crypto.derive_key(&otp);

        let mut signed = gateway_id.to_vec();
        signed.extend_from_slice(body);
        if !suite.auth.verify(&signed, &hello_key, signature) {
            return None;
        }

        let mut expected = gateway_id.to_vec();
        expected.extend_from_slice(self.profile.object_id.as_bytes());
        expected.extend_from_slice(timestamp);
        let mut response = suite.auth.sign(&expected, &hello_key).ok()?;
        if self.profile.tamper_hello_response {
            if let Some(first) = response.first_mut() {
                *first ^= 0x01;
            }
        }

        let session = SecureSession::new(
            self.profile.object_id.clone(),
            session_key,
            otp,
            suite.clone(),
        );
        Some((response, session))
    }
}
