//! Point-in-time policy snapshots and change events emitted by sources.

use chrono::{DateTime, Utc};
use smol_str::SmolStr;
use std::collections::BTreeMap;

use crate::method_id::MethodId;
use crate::policy::{CachePolicy, PolicyDelta};

/// A source's current contribution for one [`MethodId`], as of `produced_at`.
///
/// Invariant: `policy.provenance` contains exactly one [`Contribution`](crate::policy::Contribution)
/// with `source_id == snapshot.source_id`, naming the fields this snapshot
/// actually contributes.
#[derive(Clone, Debug)]
pub struct PolicySnapshot {
    /// Identifier of the emitting source (e.g. `"attributes"`, `"runtime-override"`).
    pub source_id: SmolStr,
    /// The method this snapshot describes.
    pub method_id: MethodId,
    /// The contributed (partial) policy.
    pub policy: CachePolicy,
    /// When the source produced this snapshot.
    pub produced_at: DateTime<Utc>,
    /// Source-defined free-form metadata (e.g. file path, line number).
    pub metadata: BTreeMap<String, String>,
}

/// Why a [`PolicyChange`] was emitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeReason {
    /// The source started contributing to this method for the first time.
    Added,
    /// The source's contribution for this method changed.
    Updated,
    /// The source no longer contributes to this method.
    Removed,
}

/// An incremental update to one source's contribution for one method.
#[derive(Clone, Debug)]
pub struct PolicyChange {
    /// Identifier of the emitting source.
    pub source_id: SmolStr,
    /// The method this change describes.
    pub method_id: MethodId,
    /// What changed.
    pub delta: PolicyDelta,
    /// Why it changed.
    pub reason: ChangeReason,
    /// When the change occurred.
    pub at: DateTime<Utc>,
}

impl PolicyChange {
    /// `true` iff this is a no-op `Removed`: a `Removed` with an empty
    /// field mask is treated as a no-op rather than an error — the
    /// resolver still applies it, it just has nothing to clear.
    pub fn is_noop_removal(&self) -> bool {
        self.reason == ChangeReason::Removed && self.delta.clear_mask.is_empty()
    }
}

/// Recommended registration priority for a policy source — unused at the
/// data-model level, but the defaults live here since they are part of the
/// cross-crate wire contract, not an implementation detail of any one
/// source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourcePriority(pub i64);

impl SourcePriority {
    /// Recommended priority for the `Attributes` source.
    pub const ATTRIBUTES: SourcePriority = SourcePriority(10);
    /// Recommended priority for the `Fluent` source.
    pub const FLUENT: SourcePriority = SourcePriority(20);
    /// Recommended priority for the `ConfigFile` source.
    pub const CONFIG_FILE: SourcePriority = SourcePriority(30);
    /// Recommended priority for the `RuntimeOverride` source — always wins.
    pub const RUNTIME_OVERRIDE: SourcePriority = SourcePriority(i64::MAX);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::FieldMask;

    #[test]
    fn noop_removal_has_empty_clear_mask() {
        let change = PolicyChange {
            source_id: "runtime-override".into(),
            method_id: MethodId::new("Svc", "M"),
            delta: PolicyDelta::clear_fields(FieldMask::empty()),
            reason: ChangeReason::Removed,
            at: Utc::now(),
        };
        assert!(change.is_noop_removal());
    }

    #[test]
    fn removal_with_fields_is_not_noop() {
        let change = PolicyChange {
            source_id: "runtime-override".into(),
            method_id: MethodId::new("Svc", "M"),
            delta: PolicyDelta::clear_fields(FieldMask::DURATION),
            reason: ChangeReason::Removed,
            at: Utc::now(),
        };
        assert!(!change.is_noop_removal());
    }

    #[test]
    fn runtime_override_outranks_everything() {
        assert!(SourcePriority::RUNTIME_OVERRIDE > SourcePriority::CONFIG_FILE);
        assert!(SourcePriority::CONFIG_FILE > SourcePriority::FLUENT);
        assert!(SourcePriority::FLUENT > SourcePriority::ATTRIBUTES);
    }
}
