// Copyright (c) 2025-2026 Nyx Systems LLC.
// SPDX-License-Identifier: SEE LICENSE IN ../../LICENSE
//
// This file is part of EdgeSec (gateway-to-smart-object authentication).
// Free for non-commercial use. Commercial use requires a license.
// See LICENSE and COMMERCIAL_LICENSE.md for details.

// EdgeSec demo gateway
// Loopback transport and simulated smart objects for running the full
// protocol in one process

use std::sync::Arc;
use std::time::Duration;

use edgesec_authority::AuthorityConfig;
use edgesec_core::EdgeSecError;

pub mod device;
pub mod loopback;

pub use device::{DeviceProfile, SimulatedDevice};
pub use loopback::LoopbackTransport;

/// Loopback address of the `index`-th simulated device.
pub fn device_address(index: usize) -> String {
    format!("02:00:00:00:{:02X}:{:02X}", (index >> 8) & 0xff, index & 0xff)
}

/// Put one simulated object per registered object on `transport`, each
/// with the given link latency. Returns the addresses in registration order.
pub fn populate_from_authority(
    transport: &LoopbackTransport,
    config: &AuthorityConfig,
    delay: Duration,
) -> Result<Vec<String>, EdgeSecError> {
    let mut addresses = Vec::with_capacity(config.objects.len());
    for (index, (object_id, record)) in config.objects.iter().enumerate() {
        let device = SimulatedDevice::provision(
            object_id,
            record,
            &config.core_auth_key,
            edgesec_plugins::ciphers(),
            edgesec_plugins::macs(),
        )?;
        let address = device_address(index);
        transport.add_device(&address, Arc::new(device), delay);
        addresses.push(address);
    }
    Ok(addresses)
}
