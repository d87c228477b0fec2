//! Deterministic MessagePack key generator.
//!
//! Encodes the method id and arguments with `rmp-serde`, then digests the
//! resulting bytes with SHA-256 so the key stays a fixed, short length
//! regardless of argument size — the binary counterpart to
//! [`JsonKeyGenerator`](super::JsonKeyGenerator).

use sha2::{Digest, Sha256};

use super::canonical::{Arg, MethodArgs};
use super::{KeyGenerator, KeyGeneratorKind};
use crate::error::KeyGenError;
use crate::key::Key;
use crate::method_id::MethodId;

/// MessagePack + SHA-256 key generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct MessagePackKeyGenerator;

impl KeyGenerator for MessagePackKeyGenerator {
    fn generate(&self, method_id: &MethodId, args: &[Arg]) -> Result<Key, KeyGenError> {
        let payload = MethodArgs::new(method_id, args);
        let encoded = rmp_serde::to_vec(&payload)
            .map_err(|e| KeyGenError::Canonicalization(e.to_string()))?;
        let digest = Sha256::digest(&encoded);
        Ok(Key::new(hex_encode(&digest)))
    }

    fn kind(&self) -> KeyGeneratorKind {
        KeyGeneratorKind::MessagePack
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_stable_across_calls() {
        let r#gen = MessagePackKeyGenerator;
        let method = MethodId::new("Orders", "Get");
        let args = vec![Arg::Int(1), Arg::Bool(true)];
        assert_eq!(
            r#gen.generate(&method, &args).unwrap(),
            r#gen.generate(&method, &args).unwrap()
        );
    }

    #[test]
    fn differs_from_json_generator_key_shape() {
        let r#gen = MessagePackKeyGenerator;
        let method = MethodId::new("Orders", "Get");
        let key = r#gen.generate(&method, &[Arg::Int(1)]).unwrap();
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
