// Copyright (c) 2025-2026 Nyx Systems LLC.
// SPDX-License-Identifier: SEE LICENSE IN ../../LICENSE
//
// This file is part of EdgeSec (gateway-to-smart-object authentication).
// Free for non-commercial use. Commercial use requires a license.
// See LICENSE and COMMERCIAL_LICENSE.md for details.

// Algorithm plugins for EdgeSec protocol suites
// Ciphers register under their cipher name, MACs under their two-token MAC name

use std::sync::Arc;

use edgesec_core::capability::CapabilityError;
use edgesec_core::{AuthenticationCapability, CryptographicCapability};
use rand::rngs::OsRng;
use rand::RngCore;

pub mod cipher;
pub mod mac;
pub mod stream;

pub use cipher::ChaCha20Cipher;
pub use mac::{HmacMd5, HmacSha1, HmacSha256};
pub use stream::Rc4Cipher;

/// Every cipher this crate provides.
pub fn ciphers() -> Vec<Arc<dyn CryptographicCapability>> {
    vec![Arc::new(ChaCha20Cipher), Arc::new(Rc4Cipher)]
}

/// Every MAC this crate provides.
pub fn macs() -> Vec<Arc<dyn AuthenticationCapability>> {
    vec![Arc::new(HmacMd5), Arc::new(HmacSha1), Arc::new(HmacSha256)]
}

pub(crate) fn random_bytes(size: usize) -> Result<Vec<u8>, CapabilityError> {
    let mut buf = vec![0u8; size];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| CapabilityError::Random(e.to_string()))?;
    Ok(buf)
}
