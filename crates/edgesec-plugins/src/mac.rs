//! HMAC authentication capabilities
//!
//! `sign` is HMAC over the data, `hash` is the bare digest. Verification
//! goes through `Mac::verify_slice`, which compares in constant time.

use edgesec_core::capability::CapabilityError;
use edgesec_core::{AuthenticationCapability, SecretKey};
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

macro_rules! hmac_capability {
    ($(#[$doc:meta])* $name:ident, $digest:ty, $id:literal, $size:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl AuthenticationCapability for $name {
            fn protocol_id(&self) -> &str {
                $id
            }

            fn sign(&self, data: &[u8], key: &SecretKey) -> Result<Vec<u8>, CapabilityError> {
                let mut mac = Hmac::<$digest>::new_from_slice(key.as_bytes()).map_err(|_| {
                    CapabilityError::InvalidKey {
                        algorithm: $id.to_string(),
                    }
                })?;
                mac.update(data);
                Ok(mac.finalize().into_bytes().to_vec())
            }

            fn verify(&self, data: &[u8], key: &SecretKey, signature: &[u8]) -> bool {
                match Hmac::<$digest>::new_from_slice(key.as_bytes()) {
                    Ok(mut mac) => {
                        mac.update(data);
                        mac.verify_slice(signature).is_ok()
                    }
                    Err(_) => false,
                }
            }

            fn hash(&self, payload: &[u8]) -> Vec<u8> {
                <$digest as Digest>::digest(payload).to_vec()
            }

            fn hash_size(&self) -> usize {
                $size
            }
        }
    };
}

hmac_capability!(
    /// `HMAC_MD5`. Kept for deployed objects that only speak MD5 suites.
    HmacMd5, Md5, "HMAC_MD5", 16
);
hmac_capability!(
    /// `HMAC_SHA1`
    HmacSha1, Sha1, "HMAC_SHA1", 20
);
hmac_capability!(
    /// `HMAC_SHA256`
    HmacSha256, Sha256, "HMAC_SHA256", 32
);
