//! Human-readable "Smart" key generator.
//!
//! Earlier designs for this generator inspected call-site closures to infer
//! argument names via reflection; this implementation deliberately does not
//! — callers pass explicit `(name, Arg)` pairs, and the key is built only
//! from what was actually passed in. No source-span or macro magic.

use super::canonical::Arg;
use super::{KeyGenerator, KeyGeneratorKind};
use crate::error::KeyGenError;
use crate::key::Key;
use crate::method_id::MethodId;

/// Builds `Svc.Method(name=value, name2=value2)`-shaped keys.
///
/// Unlike the other four generators, `Smart` needs argument *names*, so it
/// takes `&[(&str, Arg)]` through [`SmartKeyGenerator::generate_named`]
/// rather than implementing the positional [`KeyGenerator`] trait directly
/// over bare `Arg` values (those arrive pre-named as `arg0`, `arg1`, ...).
#[derive(Debug, Default, Clone, Copy)]
pub struct SmartKeyGenerator;

impl SmartKeyGenerator {
    /// Builds a key from explicitly named arguments.
    pub fn generate_named(
        &self,
        method_id: &MethodId,
        named_args: &[(&str, Arg)],
    ) -> Result<Key, KeyGenError> {
        let rendered = named_args
            .iter()
            .map(|(name, arg)| format!("{name}={}", arg.canonical_token()))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Key::new(format!("{}({rendered})", method_id.as_str())))
    }
}

impl KeyGenerator for SmartKeyGenerator {
    fn generate(&self, method_id: &MethodId, args: &[Arg]) -> Result<Key, KeyGenError> {
        let named: Vec<(&str, Arg)> = args
            .iter()
            .enumerate()
            .map(|(i, arg)| (POSITIONAL_NAMES.get(i).copied().unwrap_or("argN"), arg.clone()))
            .collect();
        self.generate_named(method_id, &named)
    }

    fn kind(&self) -> KeyGeneratorKind {
        KeyGeneratorKind::Smart
    }
}

const POSITIONAL_NAMES: &[&str] = &[
    "arg0", "arg1", "arg2", "arg3", "arg4", "arg5", "arg6", "arg7",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_arguments_are_human_readable() {
        let r#gen = SmartKeyGenerator;
        let method = MethodId::new("Orders", "Get");
        let key = r#gen
            .generate_named(&method, &[("orderId", Arg::Int(42))])
            .unwrap();
        assert_eq!(key.as_str(), "Orders.Get(orderId=42)");
    }

    #[test]
    fn positional_fallback_names_unnamed_args() {
        let r#gen = SmartKeyGenerator;
        let method = MethodId::new("Orders", "Get");
        let key = r#gen.generate(&method, &[Arg::Int(1), Arg::Bool(true)]).unwrap();
        assert_eq!(key.as_str(), "Orders.Get(arg0=1, arg1=True)");
    }
}
