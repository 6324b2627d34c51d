//! In-memory object storage for local runs and tests

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{object_key, public_url, ObjectStorage, PresignedUrl},
};
use bytes::Bytes;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// An object held by [`InMemoryObjectStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

/// Object storage backed by a map keyed on the physical object key.
///
/// Fetch failures can be injected per filename to exercise upstream error paths.
pub struct InMemoryObjectStorage {
    objects: RwLock<HashMap<String, StoredObject>>,
    failing_fetches: RwLock<HashSet<String>>,
    cdn_domain: String,
    url_ttl: Duration,
}

impl InMemoryObjectStorage {
    pub fn new(cdn_domain: impl Into<String>) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            failing_fetches: RwLock::new(HashSet::new()),
            cdn_domain: cdn_domain.into(),
            url_ttl: Duration::from_secs(3600),
        }
    }

    /// Store an object as if a client had uploaded it.
    pub async fn insert(&self, filename: &str, data: impl Into<Bytes>, content_type: &str) {
        self.objects.write().await.insert(
            object_key(filename),
            StoredObject {
                data: data.into(),
                content_type: content_type.to_string(),
            },
        );
    }

    pub async fn get(&self, filename: &str) -> Option<StoredObject> {
        self.objects.read().await.get(&object_key(filename)).cloned()
    }

    pub async fn contains(&self, filename: &str) -> bool {
        self.objects.read().await.contains_key(&object_key(filename))
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Make every subsequent fetch of `filename` fail.
    pub async fn fail_fetch(&self, filename: &str) {
        self.failing_fetches.write().await.insert(filename.to_string());
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn fetch(&self, filename: &str) -> Result<Bytes> {
        if self.failing_fetches.read().await.contains(filename) {
            return Err(BridgeError::OperationFailed(format!(
                "injected fetch failure for {filename}"
            )));
        }

        let key = object_key(filename);
        self.objects
            .read()
            .await
            .get(&key)
            .map(|object| object.data.clone())
            .ok_or(BridgeError::NotFound(key))
    }

    async fn put_derivative(&self, filename: &str, data: Bytes, content_type: &str) -> Result<()> {
        debug!(filename = %filename, size = data.len(), "Storing derivative in memory");
        self.insert(filename, data, content_type).await;
        Ok(())
    }

    async fn presign_upload(&self, filename: &str, _content_type: &str) -> Result<PresignedUrl> {
        let ttl = chrono::Duration::from_std(self.url_ttl)
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
        Ok(PresignedUrl {
            url: format!("memory://{}", object_key(filename)),
            expires_at: Utc::now() + ttl,
        })
    }

    fn public_url(&self, filename: &str) -> String {
        public_url(&self.cdn_domain, filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_round_trip() {
        let storage = InMemoryObjectStorage::new("cdn.test");
        storage.insert("cat.jpg", vec![1u8, 2, 3], "image/jpeg").await;

        assert_eq!(storage.fetch("cat.jpg").await.unwrap(), Bytes::from_static(&[1, 2, 3]));
        assert!(matches!(
            storage.fetch("dog.jpg").await,
            Err(BridgeError::NotFound(key)) if key == "originals/dog.jpg"
        ));
    }

    #[tokio::test]
    async fn test_derivatives_land_under_enhanced() {
        let storage = InMemoryObjectStorage::new("cdn.test");
        storage
            .put_derivative("enhanced_cat.jpg", Bytes::from_static(b"jpeg"), "image/jpeg")
            .await
            .unwrap();

        assert!(storage.contains("enhanced_cat.jpg").await);
        assert_eq!(
            storage.get("enhanced_cat.jpg").await.unwrap().content_type,
            "image/jpeg"
        );
        assert_eq!(
            storage.public_url("enhanced_cat.jpg"),
            "https://cdn.test/enhanced/enhanced_cat.jpg"
        );
    }

    #[tokio::test]
    async fn test_injected_fetch_failure() {
        let storage = InMemoryObjectStorage::new("cdn.test");
        storage.insert("cat.jpg", vec![0u8], "image/jpeg").await;
        storage.fail_fetch("cat.jpg").await;

        assert!(matches!(
            storage.fetch("cat.jpg").await,
            Err(BridgeError::OperationFailed(_))
        ));
    }
}
