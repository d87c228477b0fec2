//! In-memory fakes and deterministic fixtures shared by the workspace's
//! tests. Dev-dependency only; never published or depended on by the
//! runtime crates outside `#[cfg(test)]`/dev-dependency contexts.

mod backplane;
mod clock;
mod remote;

pub use backplane::InMemoryBackplane;
pub use clock::TestClock;
pub use remote::{InMemoryDistributedStorage, InMemoryPersistentStorage};
