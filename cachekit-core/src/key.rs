//! The opaque cache key produced by a [`KeyGenerator`](crate::keygen::KeyGenerator).

use std::fmt;

use smol_str::SmolStr;

/// An opaque, already-generated cache key.
///
/// Keys carry their policy version as a trailing `::v{N}` suffix so a
/// version bump invalidates every previously generated key without an
/// explicit sweep — old keys simply stop being produced or looked up.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(SmolStr);

impl Key {
    /// Wraps an already-formatted key string verbatim.
    pub fn new(raw: impl Into<SmolStr>) -> Self {
        Key(raw.into())
    }

    /// Appends a policy version suffix to a base key.
    pub fn with_version(base: &str, version: u32) -> Self {
        Key(SmolStr::new(format!("{base}::v{version}")))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_suffix_is_appended() {
        let key = Key::with_version("Svc.Method|1", 3);
        assert_eq!(key.as_str(), "Svc.Method|1::v3");
    }
}
