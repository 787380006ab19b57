// Copyright (c) 2025-2026 Nyx Systems LLC.
// SPDX-License-Identifier: SEE LICENSE IN ../../LICENSE
//
// This file is part of EdgeSec (gateway-to-smart-object authentication).
// Free for non-commercial use. Commercial use requires a license.
// See LICENSE and COMMERCIAL_LICENSE.md for details.

//! Reference authorization service
//!
//! Decides whether a gateway may talk to an object and, if so, issues the
//! bundle for one connection:
//!
//! 1. the object must be registered, and the gateway on its allow-list
//! 2. the suite is the first in preference order the object supports
//! 3. `otp = hash(objectId ++ gatewayId ++ challenge ++ objectAuthKey)`
//! 4. `authPackage = otp ++ sessionKey`, encrypted under the object's
//!    cipher key and signed with a key derived from the core secret

use std::sync::Arc;

use async_trait::async_trait;
use edgesec_core::wire::{OTP_CHALLENGE_SIZE, SESSION_KEY_SEED_SIZE};
use edgesec_core::{
    AuthenticationBundle, AuthenticationCapability, AuthorizationFailure, AuthorizationProvider,
    CryptographicCapability, EdgeSecError, SecretBytes, SuiteRegistry,
};
use tracing::{info, warn};

pub mod config;
pub mod response;

pub use config::{AuthorityConfig, ObjectRecord};
pub use response::{AuthorizationResponse, ResponseError};

pub struct ReferenceAuthority {
    config: AuthorityConfig,
    registry: SuiteRegistry,
}

impl ReferenceAuthority {
    pub fn new(
        config: AuthorityConfig,
        crypto: Vec<Arc<dyn CryptographicCapability>>,
        auth: Vec<Arc<dyn AuthenticationCapability>>,
    ) -> Result<Self, EdgeSecError> {
        let registry = SuiteRegistry::new(crypto, auth, config.suite_preference.clone())?;
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    /// Vet the pair and build its bundle.
    pub fn issue(
        &self,
        gateway_id: &str,
        object_id: &str,
    ) -> Result<AuthenticationBundle, AuthorizationFailure> {
        let record = self
            .config
            .objects
            .get(object_id)
            .ok_or(AuthorizationFailure::NotRegistered)?;

        if !record.authorizes(gateway_id) {
            return Err(AuthorizationFailure::NotAuthorized);
        }

        let suite = self
            .registry
            .select_suite(&record.supported_suites)
            .ok_or(AuthorizationFailure::NoCommonSuite)?;
        let resolved = self
            .registry
            .resolve(&suite)
            .map_err(|e| AuthorizationFailure::CapabilityUnavailable(e.to_string()))?;
        let crypto = &resolved.crypto;
        let auth = &resolved.auth;

        let challenge = random_exact(crypto.as_ref(), OTP_CHALLENGE_SIZE)?;
        let seed = random_exact(crypto.as_ref(), SESSION_KEY_SEED_SIZE)?;
        let session_key = crypto.derive_key(&seed).into_bytes();

        let mut otp_input = Vec::with_capacity(
            object_id.len() + gateway_id.len() + challenge.len() + record.auth_key.len(),
        );
        otp_input.extend_from_slice(object_id.as_bytes());
        otp_input.extend_from_slice(gateway_id.as_bytes());
        otp_input.extend_from_slice(&challenge);
        otp_input.extend_from_slice(record.auth_key.as_bytes());
        let otp = SecretBytes::new(auth.hash(&otp_input));

        let mut package = SecretBytes::new([otp.as_slice(), session_key.as_slice()].concat());
        let mut sealed = crypto
            .encrypt(&package, record.cipher_key.as_bytes())
            .map_err(|e| AuthorizationFailure::Rejected(e.to_string()))?;
        package.zero();

        let core_key = crypto.derive_key(self.config.core_auth_key.as_bytes());
        let signature = auth
            .sign(&sealed, &core_key)
            .map_err(|e| AuthorizationFailure::Rejected(e.to_string()))?;
        sealed.extend_from_slice(&signature);

        info!(
            gateway = %gateway_id,
            object = %object_id,
            suite = %suite,
            package_len = sealed.len(),
            "authorization granted"
        );

        Ok(AuthenticationBundle {
            protocol_suite: suite.to_string(),
            otp,
            session_key,
            encrypted_signed_auth_package: sealed,
        })
    }

    /// [`issue`](Self::issue), answered as an [`AuthorizationResponse`] JSON document.
    pub fn issue_json(&self, gateway_id: &str, object_id: &str) -> Result<String, String> {
        let bundle = self.issue(gateway_id, object_id).map_err(|e| e.to_string())?;
        AuthorizationResponse::from(&bundle)
            .to_json()
            .map_err(|e| e.to_string())
    }
}

fn random_exact(
    crypto: &dyn CryptographicCapability,
    size: usize,
) -> Result<Vec<u8>, AuthorizationFailure> {
    let token = crypto
        .secure_random_token(size)
        .map_err(|e| AuthorizationFailure::Rejected(e.to_string()))?;
    if token.len() != size {
        return Err(AuthorizationFailure::Rejected(format!(
            "random token of {} bytes, expected {size}",
            token.len()
        )));
    }
    Ok(token)
}

#[async_trait]
impl AuthorizationProvider for ReferenceAuthority {
    async fn authorize(
        &self,
        gateway_id: &str,
        object_id: &str,
    ) -> Result<AuthenticationBundle, AuthorizationFailure> {
        self.issue(gateway_id, object_id).map_err(|reason| {
            warn!(gateway = %gateway_id, object = %object_id, reason = %reason, "authorization refused");
            reason
        })
    }
}
