//! In-process transport wired straight to [`SimulatedDevice`]s.
//!
//! Each device can carry an artificial latency applied to every operation,
//! to exercise concurrent handshakes against slow links.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use edgesec_core::{TransportCapability, TransportError};
use parking_lot::RwLock;
use tracing::debug;

use crate::device::SimulatedDevice;

struct Endpoint {
    device: Arc<SimulatedDevice>,
    delay: Duration,
}

#[derive(Default)]
pub struct LoopbackTransport {
    endpoints: RwLock<BTreeMap<String, Endpoint>>,
    linked: RwLock<HashSet<String>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `device` reachable at `address`. Replaces any device already there.
    pub fn add_device(&self, address: &str, device: Arc<SimulatedDevice>, delay: Duration) {
        self.endpoints
            .write()
            .insert(address.to_string(), Endpoint { device, delay });
    }

    pub fn device(&self, address: &str) -> Option<Arc<SimulatedDevice>> {
        self.endpoints
            .read()
            .get(address)
            .map(|ep| ep.device.clone())
    }

    pub fn is_linked(&self, address: &str) -> bool {
        self.linked.read().contains(address)
    }

    async fn reach(
        &self,
        address: &str,
        require_link: bool,
    ) -> Result<Arc<SimulatedDevice>, TransportError> {
        let (device, delay) = {
            let endpoints = self.endpoints.read();
            let endpoint = endpoints
                .get(address)
                .ok_or_else(|| TransportError::Unreachable(address.to_string()))?;
            (endpoint.device.clone(), endpoint.delay)
        };

        let linked = self.is_linked(address);
        if require_link && !linked {
            return Err(TransportError::NotConnected(address.to_string()));
        }

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(device)
    }
}

#[async_trait]
impl TransportCapability for LoopbackTransport {
    async fn scan_devices(&self) -> Result<Vec<String>, TransportError> {
        let found: Vec<String> = self
            .endpoints
            .read()
            .iter()
            .filter(|(_, ep)| ep.device.has_service())
            .map(|(address, _)| address.clone())
            .collect();
        Ok(found)
    }

    async fn connect(&self, device_id: &str) -> Result<bool, TransportError> {
        let device = self.reach(device_id, false).await?;
        if !device.has_service() {
            return Ok(false);
        }
        self.linked.write().insert(device_id.to_string());
        debug!(device = %device_id, "link up");
        Ok(true)
    }

    async fn disconnect(&self, device_id: &str) {
        if self.linked.write().remove(device_id) {
            debug!(device = %device_id, "link down");
        }
        if let Some(device) = self.device(device_id) {
            device.reset();
        }
    }

    async fn send_handshake_hello(
        &self,
        device_id: &str,
        frame: &[u8],
    ) -> Result<bool, TransportError> {
        let device = self.reach(device_id, true).await?;
        Ok(device.on_handshake_hello(frame))
    }

    async fn read_handshake_response(
        &self,
        device_id: &str,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        let device = self.reach(device_id, true).await?;
        Ok(device.handshake_response())
    }

    async fn send_hello_message(
        &self,
        device_id: &str,
        frame: &[u8],
    ) -> Result<bool, TransportError> {
        let device = self.reach(device_id, true).await?;
        Ok(device.on_hello_message(frame))
    }

    async fn read_hello_message_response(
        &self,
        device_id: &str,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        let device = self.reach(device_id, true).await?;
        Ok(device.hello_response())
    }

    async fn read_data(&self, device_id: &str) -> Result<Option<Vec<u8>>, TransportError> {
        let device = self.reach(device_id, true).await?;
        Ok(device.next_frame())
    }

    async fn write_data(&self, device_id: &str, frame: &[u8]) -> Result<bool, TransportError> {
        let device = self.reach(device_id, true).await?;
        device
            .on_data(frame)
            .map(|()| true)
            .map_err(|e| TransportError::Device(e.to_string()))
    }
}
