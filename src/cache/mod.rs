//! Results cache
//!
//! Parse results keyed by a metadata fingerprint, with lazy TTL expiry and
//! capacity-based eviction. Background jobs share the same store, keyed by
//! job id.

mod fingerprint;
mod memory;

pub use fingerprint::Fingerprint;
pub use memory::{CacheEntry, CacheStats, MemoryCache, ResultCache};
