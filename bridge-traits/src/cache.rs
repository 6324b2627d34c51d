//! Distributed Cache Abstraction
//!
//! Key-value cache with per-entry expiry. The core uses it as a read-through
//! cache for user records and as the transport for ephemeral progress snapshots,
//! so values are opaque JSON strings and the cache never interprets them.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Cache store trait
///
/// Implementations serialize their own per-key writes. A `ttl` of zero means
/// the entry never expires.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::cache::CacheStore;
/// use std::time::Duration;
///
/// async fn remember(cache: &dyn CacheStore) -> Result<()> {
///     cache.set("user:alice", "{\"username\":\"alice\"}".into(), Duration::from_secs(3600)).await?;
///     assert!(cache.get("user:alice").await?.is_some());
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a live value, `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, replacing any previous one
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;
}
