//! Cache policy, field masks, provenance, and deltas.

use std::collections::BTreeMap;
use std::time::Duration;

use bitflags::bitflags;
use smol_str::SmolStr;

use crate::keygen::KeyGeneratorKind;
use crate::tag::Tag;

bitflags! {
    /// Bitset over the recognized [`CachePolicy`] fields.
    ///
    /// Used to describe which fields a [`PolicySnapshot`](crate::snapshot::PolicySnapshot)
    /// contributes and which fields a `Removed` [`PolicyChange`](crate::snapshot::PolicyChange)
    /// clears.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct FieldMask: u8 {
        /// `CachePolicy::duration`.
        const DURATION = 0b0000_0001;
        /// `CachePolicy::tags`.
        const TAGS = 0b0000_0010;
        /// `CachePolicy::key_generator`.
        const KEY_GENERATOR = 0b0000_0100;
        /// `CachePolicy::version`.
        const VERSION = 0b0000_1000;
        /// `CachePolicy::metadata`.
        const METADATA = 0b0001_0000;
        /// `CachePolicy::require_idempotent`.
        const REQUIRE_IDEMPOTENT = 0b0010_0000;
    }
}

impl FieldMask {
    /// All recognized fields.
    pub fn all_fields() -> FieldMask {
        FieldMask::all()
    }
}

/// Who set which fields of the effective policy, and when.
///
/// A [`CachePolicy::provenance`] is the ordered sequence of contributions
/// that were folded to produce it, in the order they were applied (i.e.
/// ascending source priority, then registration order as the tie-break).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Contribution {
    /// Identifier of the source that produced this contribution.
    pub source_id: SmolStr,
    /// Which fields this contribution set (not necessarily all non-default).
    pub fields: FieldMask,
    /// When the resolver applied this contribution.
    pub applied_at: chrono::DateTime<chrono::Utc>,
}

/// Immutable, merged cache policy for a single [`MethodId`](crate::MethodId).
///
/// Every field is optional — absence means "this field was not contributed
/// by any source", not a zero value. [`CachePolicy::EMPTY`] is the
/// all-unset value every `MethodId` starts (and can fall back) to.
///
/// Two policies are equal iff all non-provenance fields are equal;
/// provenance is metadata about *how* the policy was built, not part of
/// its identity.
#[derive(Clone, Debug, Default)]
pub struct CachePolicy {
    /// How long a cached result stays fresh. `None` means "no expiration
    /// from policy" — the storage layer still applies its own cap.
    pub duration: Option<Duration>,
    /// Tags attached to entries cached under this policy. Order is
    /// preserved but not semantically significant.
    pub tags: Vec<Tag>,
    /// Which key generator variant to use. `None` means the process
    /// default.
    pub key_generator: Option<KeyGeneratorKind>,
    /// Cache key version. Present values partition the keyspace — see
    /// invariant "Version isolation".
    pub version: Option<u32>,
    /// Free-form string metadata, e.g. the "group" carried by
    /// attribute-declared policies.
    pub metadata: BTreeMap<String, String>,
    /// When `Some(true)`, the manager asserts factory idempotency.
    pub require_idempotent: Option<bool>,
    /// Which sources contributed which fields, in fold order.
    pub provenance: Vec<Contribution>,
}

impl PartialEq for CachePolicy {
    fn eq(&self, other: &Self) -> bool {
        self.duration == other.duration
            && self.tags == other.tags
            && self.key_generator == other.key_generator
            && self.version == other.version
            && self.metadata == other.metadata
            && self.require_idempotent == other.require_idempotent
    }
}

impl Eq for CachePolicy {}

impl CachePolicy {
    /// The all-unset policy. Every `MethodId` resolves to this (or a
    /// superset of it) before any source contributes.
    pub fn empty() -> Self {
        CachePolicy::default()
    }

    /// Returns the [`FieldMask`] of fields this policy actually has a
    /// value for (ignoring provenance).
    pub fn populated_fields(&self) -> FieldMask {
        let mut mask = FieldMask::empty();
        if self.duration.is_some() {
            mask |= FieldMask::DURATION;
        }
        if !self.tags.is_empty() {
            mask |= FieldMask::TAGS;
        }
        if self.key_generator.is_some() {
            mask |= FieldMask::KEY_GENERATOR;
        }
        if self.version.is_some() {
            mask |= FieldMask::VERSION;
        }
        if !self.metadata.is_empty() {
            mask |= FieldMask::METADATA;
        }
        if self.require_idempotent.is_some() {
            mask |= FieldMask::REQUIRE_IDEMPOTENT;
        }
        mask
    }

    /// Overlays `other` on top of `self` for the fields named by `mask`,
    /// taking `other`'s value for each masked field regardless of whether
    /// it is set. This is the fold step of the resolver's merge algorithm.
    pub fn overlay(&mut self, other: &CachePolicy, mask: FieldMask) {
        if mask.contains(FieldMask::DURATION) {
            self.duration = other.duration;
        }
        if mask.contains(FieldMask::TAGS) {
            self.tags = other.tags.clone();
        }
        if mask.contains(FieldMask::KEY_GENERATOR) {
            self.key_generator = other.key_generator.clone();
        }
        if mask.contains(FieldMask::VERSION) {
            self.version = other.version;
        }
        if mask.contains(FieldMask::METADATA) {
            self.metadata = other.metadata.clone();
        }
        if mask.contains(FieldMask::REQUIRE_IDEMPOTENT) {
            self.require_idempotent = other.require_idempotent;
        }
    }

    /// Clears the fields named by `mask`, leaving the rest untouched.
    /// Used when applying a `Removed` delta's `clear_mask`.
    pub fn clear(&mut self, mask: FieldMask) {
        if mask.contains(FieldMask::DURATION) {
            self.duration = None;
        }
        if mask.contains(FieldMask::TAGS) {
            self.tags.clear();
        }
        if mask.contains(FieldMask::KEY_GENERATOR) {
            self.key_generator = None;
        }
        if mask.contains(FieldMask::VERSION) {
            self.version = None;
        }
        if mask.contains(FieldMask::METADATA) {
            self.metadata.clear();
        }
        if mask.contains(FieldMask::REQUIRE_IDEMPOTENT) {
            self.require_idempotent = None;
        }
    }
}

/// A partial update to a policy: which fields to set (with new values),
/// and which fields to clear.
///
/// `set_mask` and `clear_mask` are required to be disjoint — a field
/// cannot be both set and cleared by the same delta.
#[derive(Clone, Debug, Default)]
pub struct PolicyDelta {
    /// Fields this delta sets.
    pub set_mask: FieldMask,
    /// Fields this delta clears (unsets).
    pub clear_mask: FieldMask,
    /// New values for the fields in `set_mask`. Fields outside `set_mask`
    /// are ignored even if populated here.
    pub new_values: CachePolicy,
}

impl PolicyDelta {
    /// Builds a delta that sets every populated field of `policy` and
    /// clears nothing.
    pub fn set_all(policy: CachePolicy) -> Self {
        let set_mask = policy.populated_fields();
        PolicyDelta {
            set_mask,
            clear_mask: FieldMask::empty(),
            new_values: policy,
        }
    }

    /// Builds a delta that clears exactly `mask` and sets nothing.
    pub fn clear_fields(mask: FieldMask) -> Self {
        PolicyDelta {
            set_mask: FieldMask::empty(),
            clear_mask: mask,
            new_values: CachePolicy::empty(),
        }
    }

    /// `true` iff `set_mask` and `clear_mask` overlap, which is invalid.
    pub fn is_invalid(&self) -> bool {
        self.set_mask.intersects(self.clear_mask)
    }
}

/// TTL/staleness configuration for a single cached entity.
///
/// This is a narrower, storage-facing view distilled from a resolved
/// [`CachePolicy`] — entries carry `ttl` alone, since staleness windows are
/// a manager/FSM-level concept layered on top of the storage contract.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntityPolicyConfig {
    /// Time until cached entries expire and become invalid.
    pub ttl: Option<Duration>,
}
