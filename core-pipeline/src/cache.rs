use bridge_traits::cache::CacheStore;
use bridge_traits::error::{BridgeError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Typed JSON view over a [`CacheStore`].
///
/// Entries that no longer deserialize into the requested type are treated as
/// misses.
#[derive(Clone)]
pub struct JsonCache {
    store: Arc<dyn CacheStore>,
}

impl JsonCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                Ok(None)
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let raw = serde_json::to_string(value)
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to encode cache entry: {e}")))?;
        self.store.set(key, raw, ttl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_server::LruTtlCache;
    use bridge_traits::push::ProgressRecord;

    #[tokio::test]
    async fn test_typed_round_trip_and_bad_entries() {
        let store = Arc::new(LruTtlCache::new(16));
        let cache = JsonCache::new(store.clone());
        let ttl = Duration::from_secs(60);

        let record = ProgressRecord::new(40, "analyzing");
        cache.set("progress:alice", &record, ttl).await.unwrap();
        assert_eq!(
            cache.get::<ProgressRecord>("progress:alice").await.unwrap(),
            Some(record)
        );

        store.set("progress:bob", "not json".to_string(), ttl).await.unwrap();
        assert_eq!(cache.get::<ProgressRecord>("progress:bob").await.unwrap(), None);
        assert_eq!(cache.get::<ProgressRecord>("progress:carol").await.unwrap(), None);
    }
}
