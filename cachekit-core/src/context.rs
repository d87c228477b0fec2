//! Shared runtime context threaded through the policy and storage crates.
//!
//! Pass a `CoreContext` by reference carrying the clock and instance id;
//! never reach for a process-global singleton.

use std::fmt;

use crate::clock::{system_clock, SharedClock};

/// A 128-bit identifier for this process, used by the backplane layer to
/// tag outgoing invalidation messages and discard its own echoes.
///
/// Defaults to a fresh random value on process start; may also be
/// configured in explicitly for deployments that want a stable id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(u128);

impl InstanceId {
    /// Generates a fresh random instance id.
    pub fn generate() -> Self {
        InstanceId(rand::random())
    }

    /// Wraps an explicit value (for tests or operator-pinned instance ids).
    pub fn from_raw(value: u128) -> Self {
        InstanceId(value)
    }

    /// The raw 128-bit value.
    pub fn as_u128(&self) -> u128 {
        self.0
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId({:032x})", self.0)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Shared services passed by reference through the policy and storage
/// pipelines: a clock and this process's backplane instance id.
///
/// Intentionally does not carry a metrics or logging handle — `tracing`
/// and the `metrics` facade are already ambient (macro-based), so threading
/// them explicitly would just be ceremony.
#[derive(Clone, Debug)]
pub struct CoreContext {
    clock: SharedClock,
    instance_id: InstanceId,
}

impl CoreContext {
    /// Builds a context with an explicit clock and instance id.
    pub fn new(clock: SharedClock, instance_id: InstanceId) -> Self {
        CoreContext { clock, instance_id }
    }

    /// The shared clock.
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// This process's backplane instance id.
    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }
}

impl Default for CoreContext {
    fn default() -> Self {
        CoreContext {
            clock: system_clock(),
            instance_id: InstanceId::generate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_ids_are_distinct() {
        assert_ne!(InstanceId::generate(), InstanceId::generate());
    }

    #[test]
    fn display_is_lowercase_hex_32_chars() {
        let id = InstanceId::from_raw(0xABCDEF);
        let rendered = format!("{id}");
        assert_eq!(rendered.len(), 32);
        assert_eq!(rendered, rendered.to_lowercase());
    }
}
