//! HMAC-SHA256 based key generator.
//!
//! Recommended whenever cache keys are derived from arguments a caller does
//! not fully trust: without a signing key, an adversary who can predict the
//! hash function can manufacture key collisions.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use smol_str::SmolStr;

use super::canonical::{join_method_and_args, Arg};
use super::{KeyGenerator, KeyGeneratorKind};
use crate::error::KeyGenError;
use crate::key::Key;
use crate::method_id::MethodId;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 key generator, bound to one signing key.
#[derive(Clone)]
pub struct HmacKeyGenerator {
    key_id: SmolStr,
    secret: Vec<u8>,
}

impl HmacKeyGenerator {
    /// Builds a generator over `secret`, identified by `key_id` in the
    /// owning [`KeyGeneratorKind::Hmac`].
    pub fn new(key_id: impl Into<SmolStr>, secret: Vec<u8>) -> Self {
        HmacKeyGenerator {
            key_id: key_id.into(),
            secret,
        }
    }
}

impl std::fmt::Debug for HmacKeyGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacKeyGenerator")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl KeyGenerator for HmacKeyGenerator {
    fn generate(&self, method_id: &MethodId, args: &[Arg]) -> Result<Key, KeyGenError> {
        let canonical = join_method_and_args(method_id.as_str(), args);
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| KeyGenError::Canonicalization(e.to_string()))?;
        mac.update(canonical.as_bytes());
        let digest = mac.finalize().into_bytes();
        Ok(Key::new(hex_encode(&digest)))
    }

    fn kind(&self) -> KeyGeneratorKind {
        KeyGeneratorKind::Hmac {
            key_id: self.key_id.clone(),
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_matching_secret_to_reproduce() {
        let method = MethodId::new("Orders", "Get");
        let args = vec![Arg::Int(7)];
        let a = HmacKeyGenerator::new("k1", b"secret-a".to_vec());
        let b = HmacKeyGenerator::new("k1", b"secret-b".to_vec());
        assert_ne!(
            a.generate(&method, &args).unwrap(),
            b.generate(&method, &args).unwrap()
        );
    }

    #[test]
    fn kind_carries_key_id() {
        let r#gen = HmacKeyGenerator::new("primary", b"secret".to_vec());
        assert_eq!(
            r#gen.kind(),
            KeyGeneratorKind::Hmac {
                key_id: "primary".into()
            }
        );
    }
}
