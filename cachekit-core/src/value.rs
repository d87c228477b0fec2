//! The logical cache entry shape shared by every storage layer.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::tag::Tag;

/// A cached entry as seen by a single storage layer.
///
/// Entries are layer-local: the coordinator composes a conceptual entry
/// from whichever layer actually served a read. `value` is opaque bytes —
/// (de)serialization of the caller's `T` happens above the storage
/// contract, in the cache manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    value: Bytes,
    tags: Vec<Tag>,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    size_estimate: Option<usize>,
}

impl CacheEntry {
    /// Builds a new entry. `size_estimate` is left unset — call
    /// [`CacheEntry::with_size_estimate`] if the layer tracks memory usage.
    pub fn new(
        value: Bytes,
        tags: Vec<Tag>,
        created_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        CacheEntry {
            value,
            tags,
            created_at,
            expires_at,
            size_estimate: None,
        }
    }

    /// Attaches a memory-size estimate, as produced by a layer's
    /// [`MemoryAccounting`](crate) policy.
    pub fn with_size_estimate(mut self, bytes: usize) -> Self {
        self.size_estimate = Some(bytes);
        self
    }

    /// The raw cached bytes.
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Consumes the entry, returning its raw bytes.
    pub fn into_value(self) -> Bytes {
        self.value
    }

    /// Tags attached to this entry.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// When this entry was written.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When this entry expires, if ever.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Estimated in-memory size in bytes, if the layer tracks it.
    pub fn size_estimate(&self) -> Option<usize> {
        self.size_estimate
    }

    /// `true` iff `at` is at or past this entry's expiration.
    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| at >= exp)
    }

    /// Remaining time-to-live at `at`, or `None` if the entry never expires
    /// or has already expired.
    pub fn ttl_remaining_at(&self, at: DateTime<Utc>) -> Option<std::time::Duration> {
        let expires_at = self.expires_at?;
        (expires_at - at).to_std().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_expiring_in(secs: i64) -> (CacheEntry, DateTime<Utc>) {
        let now = Utc::now();
        let entry = CacheEntry::new(
            Bytes::from_static(b"x"),
            vec![],
            now,
            Some(now + chrono::Duration::seconds(secs)),
        );
        (entry, now)
    }

    #[test]
    fn not_expired_before_expiry() {
        let (entry, now) = entry_expiring_in(60);
        assert!(!entry.is_expired_at(now));
        assert!(!entry.is_expired_at(now + chrono::Duration::seconds(59)));
    }

    #[test]
    fn expired_at_or_after_expiry() {
        let (entry, now) = entry_expiring_in(60);
        assert!(entry.is_expired_at(now + chrono::Duration::seconds(60)));
        assert!(entry.is_expired_at(now + chrono::Duration::seconds(61)));
    }

    #[test]
    fn never_expires_without_expires_at() {
        let now = Utc::now();
        let entry = CacheEntry::new(Bytes::from_static(b"x"), vec![], now, None);
        assert!(!entry.is_expired_at(now + chrono::Duration::days(3650)));
        assert_eq!(entry.ttl_remaining_at(now), None);
    }
}
