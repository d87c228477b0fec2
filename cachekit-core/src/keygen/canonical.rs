//! Canonical argument representation shared by every key generator.
//!
//! These rules are required to produce byte-identical keys across
//! independent runtimes, so they are kept intentionally small and literal
//! rather than reusing any one language's native formatting.

use std::collections::BTreeMap;

use chrono::{DateTime, Offset, Utc};
use serde::{Serialize, Serializer};

/// A canonicalized method argument.
///
/// Callers building a cache key convert their actual argument values into
/// `Arg` once (usually through a small adapter at the call site), then hand
/// the resulting slice to a [`KeyGenerator`](super::KeyGenerator).
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    /// The literal absence of a value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// An unsigned integer (kept distinct from `Int` so large `u64` values
    /// round-trip without sign-bit loss).
    UInt(u64),
    /// A floating-point number.
    Float(f64),
    /// A UTF-8 string.
    Str(String),
    /// A point in time with an explicit UTC offset.
    DateTime(DateTime<Utc>),
    /// An enum-like value, canonicalized as `typename:value`.
    Enum {
        /// The enum's type name.
        type_name: String,
        /// The selected variant's name or value.
        value: String,
    },
    /// An ordered list of arguments.
    List(Vec<Arg>),
    /// A nested object. Always canonicalized with sorted keys.
    Map(BTreeMap<String, Arg>),
}

impl Arg {
    /// Renders this argument as the canonical token used by the
    /// string-based key generators (FastHash, HMAC, Smart).
    ///
    /// Integers render in decimal, booleans as `True`/`False`, floats in
    /// round-trippable form, datetimes as a canonical numeric form with
    /// explicit offset, strings length-delimited, null as the literal token
    /// `_NULL`, enums as `typename:value`. Lists and maps recurse, with map
    /// keys always sorted (guaranteed here by `BTreeMap`).
    pub fn canonical_token(&self) -> String {
        match self {
            Arg::Null => "_NULL".to_string(),
            Arg::Bool(true) => "True".to_string(),
            Arg::Bool(false) => "False".to_string(),
            Arg::Int(i) => i.to_string(),
            Arg::UInt(u) => u.to_string(),
            // `{:?}` on f64 is Rust's shortest round-trippable representation.
            Arg::Float(f) => format!("{f:?}"),
            Arg::Str(s) => format!("{}:{}", s.len(), s),
            Arg::DateTime(dt) => format!("{}{:+05}", dt.timestamp_millis(), dt.offset().fix().local_minus_utc() / 36),
            Arg::Enum { type_name, value } => format!("{type_name}:{value}"),
            Arg::List(items) => {
                let joined = items
                    .iter()
                    .map(Arg::canonical_token)
                    .collect::<Vec<_>>()
                    .join(",");
                format!("[{joined}]")
            }
            Arg::Map(entries) => {
                let joined = entries
                    .iter()
                    .map(|(k, v)| format!("{k}={}", v.canonical_token()))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{{{joined}}}")
            }
        }
    }
}

/// `Arg` serializes through the same canonical tokens as
/// [`Arg::canonical_token`] for scalars, so the Json and MessagePack key
/// generators produce keys using identical scalar formatting to the
/// string-based generators — only the container encoding (JSON object vs.
/// MessagePack map, both with sorted keys) differs.
impl Serialize for Arg {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Arg::List(items) => serializer.collect_seq(items),
            Arg::Map(entries) => serializer.collect_map(entries),
            other => serializer.serialize_str(&other.canonical_token()),
        }
    }
}

/// Couples a method id with its canonicalized arguments for the
/// structure-preserving generators (Json, MessagePack), which serialize
/// this directly instead of building a flat string.
#[derive(Serialize)]
pub struct MethodArgs<'a> {
    method_id: &'a str,
    args: &'a [Arg],
}

impl<'a> MethodArgs<'a> {
    /// Borrows `method_id` and `args` for one serialization pass.
    pub fn new(method_id: &'a crate::method_id::MethodId, args: &'a [Arg]) -> Self {
        MethodArgs {
            method_id: method_id.as_str(),
            args,
        }
    }
}

/// Joins a method id and its canonicalized arguments into the single
/// string the string-based key generators hash or display.
///
/// Format: `{method_id}|{arg1}&{arg2}&...`.
pub fn join_method_and_args(method_id: &str, args: &[Arg]) -> String {
    let joined_args = args
        .iter()
        .map(Arg::canonical_token)
        .collect::<Vec<_>>()
        .join("&");
    format!("{method_id}|{joined_args}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_match_spec_tokens() {
        assert_eq!(Arg::Null.canonical_token(), "_NULL");
        assert_eq!(Arg::Bool(true).canonical_token(), "True");
        assert_eq!(Arg::Bool(false).canonical_token(), "False");
        assert_eq!(Arg::Int(-42).canonical_token(), "-42");
        assert_eq!(Arg::UInt(42).canonical_token(), "42");
        assert_eq!(Arg::Str("hi".into()).canonical_token(), "2:hi");
        assert_eq!(
            Arg::Enum {
                type_name: "Color".into(),
                value: "Red".into()
            }
            .canonical_token(),
            "Color:Red"
        );
    }

    #[test]
    fn float_round_trips() {
        let token = Arg::Float(1.5).canonical_token();
        assert_eq!(token.parse::<f64>().unwrap(), 1.5);
    }

    #[test]
    fn map_keys_are_sorted() {
        let mut map = BTreeMap::new();
        map.insert("b".to_string(), Arg::Int(2));
        map.insert("a".to_string(), Arg::Int(1));
        assert_eq!(Arg::Map(map).canonical_token(), "{a=1,b=2}");
    }

    #[test]
    fn deterministic_across_runs() {
        let args = vec![Arg::Str("x".into()), Arg::Int(1), Arg::Bool(true)];
        let a = join_method_and_args("Svc.M", &args);
        let b = join_method_and_args("Svc.M", &args);
        assert_eq!(a, b);
    }
}
