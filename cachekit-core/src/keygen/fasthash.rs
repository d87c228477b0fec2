//! FNV-1a based key generator.
//!
//! Fastest of the five generators and the default; not collision-resistant
//! against an adversary who controls the arguments, so `Hmac` is the
//! recommended choice for anything derived from untrusted input.

use super::canonical::{join_method_and_args, Arg};
use super::{KeyGenerator, KeyGeneratorKind};
use crate::error::KeyGenError;
use crate::key::Key;
use crate::method_id::MethodId;

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// FNV-1a key generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct FastHashKeyGenerator;

impl KeyGenerator for FastHashKeyGenerator {
    fn generate(&self, method_id: &MethodId, args: &[Arg]) -> Result<Key, KeyGenError> {
        let canonical = join_method_and_args(method_id.as_str(), args);
        let digest = fnv1a(canonical.as_bytes());
        Ok(Key::new(format!("{digest:016x}")))
    }

    fn kind(&self) -> KeyGeneratorKind {
        KeyGeneratorKind::FastHash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_produce_same_key() {
        let r#gen = FastHashKeyGenerator;
        let method = MethodId::new("Orders", "Get");
        let args = vec![Arg::Int(1)];
        assert_eq!(
            r#gen.generate(&method, &args).unwrap(),
            r#gen.generate(&method, &args).unwrap()
        );
    }

    #[test]
    fn different_args_produce_different_keys() {
        let r#gen = FastHashKeyGenerator;
        let method = MethodId::new("Orders", "Get");
        let a = r#gen.generate(&method, &[Arg::Int(1)]).unwrap();
        let b = r#gen.generate(&method, &[Arg::Int(2)]).unwrap();
        assert_ne!(a, b);
    }
}
