//! Per-call overrides accepted by [`crate::CacheManager::get_or_create`].

/// Caller-supplied overrides for a single `get_or_create` call.
#[derive(Clone, Copy, Debug, Default)]
pub struct RuntimeOptions {
    /// `Some(false)` asserts the factory is *not* idempotent. If the
    /// resolved policy requires idempotency, the call is refused before the
    /// factory ever runs. `None` is advisory only: the manager does not
    /// second-guess a caller who didn't assert anything.
    pub idempotent: Option<bool>,
}

impl RuntimeOptions {
    /// The default: no assertion about idempotency either way.
    pub fn new() -> Self {
        RuntimeOptions::default()
    }

    /// Marks the factory as non-idempotent for this call.
    pub fn non_idempotent(mut self) -> Self {
        self.idempotent = Some(false);
        self
    }
}
