//! On-disk JSON cache
//!
//! Ephemeral projection of the remote API: one file per cache key, rebuilt
//! whenever it is older than the configured expiry window.

pub mod file_cache;

pub use file_cache::CacheStore;

/// Cache key of the full collection
pub const OVERVIEW_KEY: &str = "overview";

/// Cache key of a single detail item
pub fn detail_key(id: &str) -> String {
    format!("detail-{}", id)
}
