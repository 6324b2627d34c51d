use crate::error::Result;
use crate::models::{ImageMetadata, MetadataDraft};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Image metadata repository interface
///
/// Records are keyed by the owner's namespace and the original filename.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Create or overwrite the record for `(namespace, filename)`
    ///
    /// Every field from `draft` and `processed_at` replaces what was stored;
    /// `process_count` is incremented, starting from zero for a new record.
    ///
    /// # Returns
    /// The record as stored after the write.
    async fn upsert(
        &self,
        namespace: &str,
        filename: &str,
        draft: MetadataDraft,
        processed_at: DateTime<Utc>,
    ) -> Result<ImageMetadata>;

    /// Find the record for `(namespace, filename)`
    async fn get(&self, namespace: &str, filename: &str) -> Result<Option<ImageMetadata>>;

    /// All records, in no particular order
    async fn list(&self) -> Result<Vec<ImageMetadata>>;
}

/// [`MetadataStore`] held in process memory.
#[derive(Default)]
pub struct InMemoryMetadataStore {
    records: RwLock<HashMap<(String, String), ImageMetadata>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn upsert(
        &self,
        namespace: &str,
        filename: &str,
        draft: MetadataDraft,
        processed_at: DateTime<Utc>,
    ) -> Result<ImageMetadata> {
        let mut records = self.records.write().await;
        let key = (namespace.to_string(), filename.to_string());
        let process_count = records
            .get(&key)
            .map_or(0, |existing| existing.process_count)
            .saturating_add(1);

        let record = ImageMetadata::from_draft(filename, draft, processed_at, process_count);
        records.insert(key, record.clone());

        debug!(
            namespace = %namespace,
            filename = %filename,
            process_count,
            "Upserted image metadata"
        );
        Ok(record)
    }

    async fn get(&self, namespace: &str, filename: &str) -> Result<Option<ImageMetadata>> {
        Ok(self
            .records
            .read()
            .await
            .get(&(namespace.to_string(), filename.to_string()))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<ImageMetadata>> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Analysis, UserSettings};
    use chrono::{Duration, TimeZone};

    fn draft(user_id: &str, enhanced: &str) -> MetadataDraft {
        MetadataDraft {
            user_id: user_id.to_string(),
            original_image_url: "https://cdn.test/originals/cat.jpg".to_string(),
            enhanced_image_url: enhanced.to_string(),
            analysis: Analysis::default(),
            user_settings: UserSettings::default(),
        }
    }

    #[tokio::test]
    async fn test_upsert_increments_process_count() {
        let store = InMemoryMetadataStore::new();
        let first_at = Utc.with_ymd_and_hms(2024, 5, 9, 10, 0, 0).unwrap();
        let second_at = first_at + Duration::hours(2);

        let first = store
            .upsert("alice", "cat.jpg", draft("alice", "v1"), first_at)
            .await
            .unwrap();
        assert_eq!(first.process_count, 1);

        let second = store
            .upsert("alice", "cat.jpg", draft("alice", "v2"), second_at)
            .await
            .unwrap();
        assert_eq!(second.process_count, 2);
        assert_eq!(second.enhanced_image_url, "v2");
        assert_eq!(second.processed_at, second_at);

        let stored = store.get("alice", "cat.jpg").await.unwrap().unwrap();
        assert_eq!(stored, second);
    }

    #[tokio::test]
    async fn test_records_are_namespaced() {
        let store = InMemoryMetadataStore::new();
        let now = Utc::now();

        store.upsert("alice", "cat.jpg", draft("alice", "a"), now).await.unwrap();
        store.upsert("bob", "cat.jpg", draft("bob", "b"), now).await.unwrap();

        assert_eq!(store.list().await.unwrap().len(), 2);
        assert_eq!(
            store.get("bob", "cat.jpg").await.unwrap().unwrap().process_count,
            1
        );
        assert!(store.get("carol", "cat.jpg").await.unwrap().is_none());
    }
}
