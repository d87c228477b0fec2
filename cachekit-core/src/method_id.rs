//! Canonical identifiers for cached methods.

use std::fmt;

use smol_str::SmolStr;

/// Canonical `ServiceType.MethodName` identifier for a cached call site.
///
/// `MethodId` is created the first time a proxy or manual call references a
/// method and is never destroyed afterwards — removing all policy
/// contributions for it just leaves it addressable as [`CachePolicy::empty`](crate::CachePolicy::empty).
///
/// Nested-type separators (`+`, as emitted by some reflection-based
/// generators for nested classes) are normalized to `.` so the same logical
/// method always canonicalizes to the same id regardless of source.
///
/// # Example
///
/// ```
/// use cachekit_core::MethodId;
///
/// let a = MethodId::new("Orders.Service+Inner", "GetById");
/// let b = MethodId::new("Orders.Service.Inner", "GetById");
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "Orders.Service.Inner.GetById");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct MethodId(SmolStr);

impl MethodId {
    /// Builds a `MethodId` from a service type name and a method name.
    pub fn new(service_type: impl AsRef<str>, method_name: impl AsRef<str>) -> Self {
        let normalized = normalize_service_type(service_type.as_ref());
        MethodId(SmolStr::new(format!("{normalized}.{}", method_name.as_ref())))
    }

    /// Parses an already-canonical `ServiceType.MethodName` string.
    ///
    /// Still normalizes `+` nested-type separators, since the string may
    /// originate from a reflection-based collaborator that has not done so.
    pub fn parse(canonical: impl AsRef<str>) -> Self {
        MethodId(SmolStr::new(normalize_service_type(canonical.as_ref())))
    }

    /// Returns the canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn normalize_service_type(s: &str) -> String {
    s.replace('+', ".")
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MethodId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MethodId {
    fn from(value: &str) -> Self {
        MethodId::parse(value)
    }
}

impl From<String> for MethodId {
    fn from(value: String) -> Self {
        MethodId::parse(value)
    }
}
