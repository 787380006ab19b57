// Copyright (c) 2025-2026 Nyx Systems LLC.
// SPDX-License-Identifier: SEE LICENSE IN ../../LICENSE
//
// This file is part of EdgeSec (gateway-to-smart-object authentication).
// Free for non-commercial use. Commercial use requires a license.
// See LICENSE and COMMERCIAL_LICENSE.md for details.

//! EdgeSec core engine
//!
//! A gateway uses this crate to authenticate a constrained smart object over
//! an arbitrary transport, with the trust decision delegated to a remote
//! authorization provider. After the handshake, application data is
//! encrypted and signed per connection.
//!
//! The crate is organised leaf-first:
//! - [`capability`]: cryptographic / authentication plugin traits
//! - [`transport`]: the transport plugin trait consumed by the engine
//! - [`registry`]: protocol-suite preference and capability resolution
//! - [`authorization`]: authorization-provider trait and bundle
//! - [`handshake`]: the connect → authorize → hello → verify state machine
//! - [`session`]: established sessions and the secure read/write pipeline
//! - [`framework`]: the [`EdgeSec`] facade tying it all together

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]

pub mod authorization;
pub mod capability;
pub mod config;
pub mod error;
pub mod framework;
pub mod handshake;
pub mod identity;
pub mod registry;
pub mod session;
pub mod transport;
pub mod wire;

/// Security hardening modules
pub mod secure_memory;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use authorization::{AuthenticationBundle, AuthorizationFailure, AuthorizationProvider};
pub use capability::{AuthenticationCapability, CapabilityError, CryptographicCapability};
pub use config::{ConfigError, EngineConfig};
pub use error::{EdgeSecError, ErrorKind, TransportStep};
pub use framework::EdgeSec;
pub use handshake::{HandshakeReport, HandshakeState, HandshakeTimings};
pub use identity::{GatewayId, ProtocolSuiteId};
pub use registry::{ResolvedSuite, SuiteRegistry};
pub use secure_memory::{SecretBytes, SecretKey};
pub use session::{SecureSession, SessionStore};
pub use transport::{TransportCapability, TransportError};
