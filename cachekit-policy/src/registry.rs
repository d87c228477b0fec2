//! Synchronous read-side diagnostics over the resolver's current state:
//! "what is this method's policy and who contributed to it", "what does
//! this source currently cover".

use std::sync::Arc;

use cachekit_core::{CachePolicy, Contribution, MethodId};

use crate::resolver::Resolver;

/// A method's effective policy plus the provenance chain behind it.
#[derive(Clone, Debug)]
pub struct ResolvedPolicy {
    /// The folded policy.
    pub policy: Arc<CachePolicy>,
    /// Which sources contributed which fields, in fold order.
    pub contributions: Vec<Contribution>,
}

/// Read-only view over a [`Resolver`], keyed by method id or source id.
pub struct Registry {
    resolver: Arc<Resolver>,
}

impl Registry {
    /// Wraps `resolver` for diagnostic lookups.
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Registry { resolver }
    }

    /// The effective policy and provenance for `method_id`.
    pub fn get_policy(&self, method_id: &MethodId) -> ResolvedPolicy {
        let policy = self.resolver.resolve(method_id);
        let contributions = policy.provenance.clone();
        ResolvedPolicy { policy, contributions }
    }

    /// Method ids `source_id` currently contributes to. Empty if the
    /// source id was never registered.
    pub fn find_by_source(&self, source_id: &str) -> Vec<MethodId> {
        match self.resolver.source_index(source_id) {
            Some(idx) => self.resolver.methods_for_source(idx),
            None => Vec::new(),
        }
    }

    /// The provenance chain for `method_id`, optionally filtered to one
    /// source.
    pub fn get_contributions(&self, method_id: &MethodId, source_id: Option<&str>) -> Vec<Contribution> {
        let all = self.resolver.contributions(method_id);
        match source_id {
            Some(id) => all.into_iter().filter(|c| c.source_id == id).collect(),
            None => all,
        }
    }
}
