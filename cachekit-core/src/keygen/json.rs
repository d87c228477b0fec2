//! Canonical sorted-key JSON key generator.
//!
//! Produces a human-inspectable key at the cost of being the most verbose
//! of the five generators. Useful while debugging cache misses, since the
//! key itself shows the argument values.

use super::canonical::{Arg, MethodArgs};
use super::{KeyGenerator, KeyGeneratorKind};
use crate::error::KeyGenError;
use crate::key::Key;
use crate::method_id::MethodId;

/// Canonical-JSON key generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonKeyGenerator;

impl KeyGenerator for JsonKeyGenerator {
    fn generate(&self, method_id: &MethodId, args: &[Arg]) -> Result<Key, KeyGenError> {
        let payload = MethodArgs::new(method_id, args);
        let json = serde_json::to_string(&payload)
            .map_err(|e| KeyGenError::Canonicalization(e.to_string()))?;
        Ok(Key::new(json))
    }

    fn kind(&self) -> KeyGeneratorKind {
        KeyGeneratorKind::Json
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn object_keys_are_sorted_regardless_of_insertion_order() {
        let r#gen = JsonKeyGenerator;
        let method = MethodId::new("Orders", "Get");

        let mut map_ab = BTreeMap::new();
        map_ab.insert("a".to_string(), Arg::Int(1));
        map_ab.insert("b".to_string(), Arg::Int(2));

        let key = r#gen.generate(&method, &[Arg::Map(map_ab)]).unwrap();
        assert!(key.as_str().find("\"a\"").unwrap() < key.as_str().find("\"b\"").unwrap());
    }

    #[test]
    fn is_stable_across_calls() {
        let r#gen = JsonKeyGenerator;
        let method = MethodId::new("Orders", "Get");
        let args = vec![Arg::Str("x".into())];
        assert_eq!(
            r#gen.generate(&method, &args).unwrap(),
            r#gen.generate(&method, &args).unwrap()
        );
    }
}
