//! The [`EdgeSec`] facade
//!
//! Owns the collaborators of one gateway: its identity, the transport, the
//! suite registry, the authorization provider and the session store. Every
//! method takes `&self`, so one `Arc<EdgeSec>` can serve many device tasks
//! at once.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, error, info};

use crate::authorization::AuthorizationProvider;
use crate::capability::{AuthenticationCapability, CryptographicCapability};
use crate::config::EngineConfig;
use crate::error::{EdgeSecError, TransportStep};
use crate::handshake::{received, sent, Handshake, HandshakeReport};
use crate::identity::GatewayId;
use crate::registry::SuiteRegistry;
use crate::session::SessionStore;
use crate::transport::{TransportCapability, TransportError};
use crate::validation::sanitize_for_log;

pub struct EdgeSec {
    gateway_id: GatewayId,
    transport: Arc<dyn TransportCapability>,
    registry: SuiteRegistry,
    provider: RwLock<Arc<dyn AuthorizationProvider>>,
    sessions: SessionStore,
    config: EngineConfig,
}

impl EdgeSec {
    /// Validate the configuration and build the engine.
    ///
    /// Fails if the gateway id is not exactly 10 bytes or if either
    /// capability list is empty. Nothing is retained on failure.
    pub fn initialize(
        config: EngineConfig,
        transport: Arc<dyn TransportCapability>,
        crypto: Vec<Arc<dyn CryptographicCapability>>,
        auth: Vec<Arc<dyn AuthenticationCapability>>,
        provider: Arc<dyn AuthorizationProvider>,
    ) -> Result<Self, EdgeSecError> {
        let gateway_id = GatewayId::new(&config.gateway_id)?;
        if config.max_frame_size == 0 {
            return Err(EdgeSecError::InvalidConfig(
                "max_frame_size must be positive".to_string(),
            ));
        }
        let registry = SuiteRegistry::new(crypto, auth, config.suite_preference.clone())?;

        info!(
            gateway = %gateway_id,
            registry = ?registry,
            "EdgeSec initialized"
        );

        Ok(Self {
            gateway_id,
            transport,
            registry,
            provider: RwLock::new(provider),
            sessions: SessionStore::new(),
            config,
        })
    }

    pub fn gateway_id(&self) -> &GatewayId {
        &self.gateway_id
    }

    pub fn registry(&self) -> &SuiteRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Replace the authorization provider. Handshakes already past the
    /// authorization step are unaffected.
    pub fn set_authorization_provider(&self, provider: Arc<dyn AuthorizationProvider>) {
        *self.provider.write() = provider;
    }

    /// Devices the transport can currently see.
    pub async fn search_devices(&self) -> Result<Vec<String>, TransportError> {
        let devices = self.transport.scan_devices().await?;
        debug!(count = devices.len(), "device scan finished");
        Ok(devices)
    }

    /// Run one handshake against `device_id`.
    ///
    /// On success the device has a live session and can be used with
    /// [`secure_read`](Self::secure_read) and [`secure_write`](Self::secure_write).
    pub async fn secure_connect(&self, device_id: &str) -> Result<HandshakeReport, EdgeSecError> {
        let provider = self.provider.read().clone();
        Handshake {
            gateway_id: &self.gateway_id,
            transport: self.transport.as_ref(),
            provider: provider.as_ref(),
            registry: &self.registry,
            config: &self.config,
        }
        .run(device_id, &self.sessions)
        .await
    }

    /// Read, verify and decrypt one frame from `device_id`.
    pub async fn secure_read(&self, device_id: &str) -> Result<Vec<u8>, EdgeSecError> {
        let session = self
            .sessions
            .get(device_id)
            .ok_or(EdgeSecError::NotConnected)?;

        let started = Instant::now();
        let frame = received(
            TransportStep::ReadData,
            self.transport.read_data(device_id).await,
        )?;
        let receive = started.elapsed();

        let started = Instant::now();
        let data = session
            .open(&frame, self.config.max_frame_size)
            .map_err(|err| {
                if err.is_security_relevant() {
                    error!(
                        security = true,
                        device = %sanitize_for_log(device_id),
                        error = %err,
                        "secure read rejected"
                    );
                }
                err
            })?;

        debug!(
            device = %sanitize_for_log(device_id),
            bytes = data.len(),
            receive_us = receive.as_micros() as u64,
            verify_us = started.elapsed().as_micros() as u64,
            "secure read"
        );
        Ok(data)
    }

    /// Encrypt, sign and send `data` to `device_id`.
    pub async fn secure_write(&self, device_id: &str, data: &[u8]) -> Result<(), EdgeSecError> {
        let session = self
            .sessions
            .get(device_id)
            .ok_or(EdgeSecError::NotConnected)?;

        let frame = session.seal(data)?;
        sent(
            TransportStep::WriteData,
            self.transport.write_data(device_id, &frame).await,
        )?;

        debug!(
            device = %sanitize_for_log(device_id),
            bytes = data.len(),
            "secure write"
        );
        Ok(())
    }

    /// Disconnect the transport and forget the session. Safe to repeat.
    pub async fn disconnect(&self, device_id: &str) {
        self.transport.disconnect(device_id).await;
        if self.sessions.remove(device_id).is_some() {
            info!(device = %sanitize_for_log(device_id), "session closed");
        }
    }

    pub fn is_connected(&self, device_id: &str) -> bool {
        self.sessions.contains(device_id)
    }
}

impl fmt::Debug for EdgeSec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeSec")
            .field("gateway_id", &self.gateway_id)
            .field("registry", &self.registry)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}
