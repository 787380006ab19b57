//! Fixed-width wire fields of the EdgeSec handshake.
//!
//! These sizes are protocol contract. Changing any of them breaks
//! interoperability with deployed smart objects.

/// Protocol version carried in the handshake hello.
pub const PROTOCOL_VERSION: &[u8; PROTOCOL_VERSION_SIZE] = b"1.0";

/// Width of the protocol-version field (bytes)
pub const PROTOCOL_VERSION_SIZE: usize = 3;

/// Width of the gateway identifier field (bytes)
pub const GATEWAY_ID_SIZE: usize = 10;

/// Width of the device (object) identifier field (bytes)
pub const DEVICE_ID_SIZE: usize = 10;

/// Size of the handshake hello frame: version ++ gateway id
pub const HANDSHAKE_HELLO_SIZE: usize = PROTOCOL_VERSION_SIZE + GATEWAY_ID_SIZE;

/// Length of the random OTP challenge issued by the authorization provider
pub const OTP_CHALLENGE_SIZE: usize = 13;

/// Length of the random seed a session key is derived from
pub const SESSION_KEY_SEED_SIZE: usize = 11;

/// Width of the hello timestamp (seconds since epoch, u32 little-endian)
pub const TIMESTAMP_SIZE: usize = 4;

/// Default upper bound for any frame read from a device (bytes)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024;

/// Build the handshake hello frame.
pub fn handshake_hello(gateway_id: &[u8; GATEWAY_ID_SIZE]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HANDSHAKE_HELLO_SIZE);
    frame.extend_from_slice(PROTOCOL_VERSION);
    frame.extend_from_slice(gateway_id);
    frame
}

/// Encode a Unix timestamp (seconds) into its fixed-width wire form.
///
/// The value is truncated to 32 bits, matching what deployed objects parse.
pub fn encode_timestamp(unix_secs: i64) -> [u8; TIMESTAMP_SIZE] {
    (unix_secs as u32).to_le_bytes()
}

/// Decode a fixed-width wire timestamp.
pub fn decode_timestamp(bytes: [u8; TIMESTAMP_SIZE]) -> u32 {
    u32::from_le_bytes(bytes)
}
