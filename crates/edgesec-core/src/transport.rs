//! Transport plugin boundary
//!
//! The engine never speaks a concrete link protocol. A transport (BLE GATT,
//! serial, a loopback test harness, ...) moves opaque byte buffers on named
//! logical channels for a device identified by an address string.

use async_trait::async_trait;
use thiserror::Error;

/// Errors a transport can report for a single operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The device is unknown or went out of range.
    #[error("device {0} is unreachable")]
    Unreachable(String),

    /// No live link to the device.
    #[error("device {0} is not connected")]
    NotConnected(String),

    /// The operation did not complete in time.
    #[error("transport operation timed out")]
    Timeout,

    /// Device- or stack-specific failure, reported verbatim.
    #[error("{0}")]
    Device(String),
}

/// Transport capability consumed by the handshake engine and the secure
/// session pipeline.
///
/// Boolean results report a negative outcome the transport completed cleanly
/// (e.g. the device rejected the write); `Err` reports that the operation
/// itself failed. For reads, `Ok(None)` means no data was available, which
/// the engine treats as a failure rather than an empty message.
#[async_trait]
pub trait TransportCapability: Send + Sync {
    /// Scan for nearby devices exposing the EdgeSec service.
    async fn scan_devices(&self) -> Result<Vec<String>, TransportError> {
        Ok(Vec::new())
    }

    async fn connect(&self, device_id: &str) -> Result<bool, TransportError>;

    async fn disconnect(&self, device_id: &str);

    async fn send_handshake_hello(&self, device_id: &str, frame: &[u8])
        -> Result<bool, TransportError>;

    async fn read_handshake_response(&self, device_id: &str)
        -> Result<Option<Vec<u8>>, TransportError>;

    async fn send_hello_message(&self, device_id: &str, frame: &[u8])
        -> Result<bool, TransportError>;

    async fn read_hello_message_response(
        &self,
        device_id: &str,
    ) -> Result<Option<Vec<u8>>, TransportError>;

    async fn read_data(&self, device_id: &str) -> Result<Option<Vec<u8>>, TransportError>;

    async fn write_data(&self, device_id: &str, frame: &[u8]) -> Result<bool, TransportError>;
}
