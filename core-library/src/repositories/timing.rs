use crate::error::{LibraryError, Result};
use crate::models::TimingAggregate;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use tracing::debug;

/// Processing-time aggregate repository interface
#[async_trait]
pub trait TimingStore: Send + Sync {
    /// Fold one sample into the running average for `process_type`
    ///
    /// The new average is `(avg * count + elapsed_ms) / (count + 1)`.
    ///
    /// # Returns
    /// The aggregate after the sample was applied.
    async fn record_sample(
        &self,
        process_type: &str,
        elapsed_ms: f64,
        at: DateTime<Utc>,
    ) -> Result<TimingAggregate>;

    /// Aggregates for every process type, ordered by process type
    async fn averages(&self) -> Result<Vec<TimingAggregate>>;
}

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS processing_times (
        process_type TEXT PRIMARY KEY,
        avg_time_ms REAL NOT NULL,
        sample_count INTEGER NOT NULL,
        last_updated INTEGER NOT NULL
    )
"#;

/// SQLite-backed timing store
pub struct SqliteTimingStore {
    pool: SqlitePool,
}

impl SqliteTimingStore {
    /// Open (creating if needed) a timing database at `db_path`
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        Self::init(&pool).await?;

        debug!(path = ?db_path, "Initialized timing store");
        Ok(Self { pool })
    }

    /// Create an in-memory timing store
    ///
    /// The pool is pinned to a single long-lived connection, since every
    /// connection to `:memory:` opens a separate database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::init(&pool).await?;

        Ok(Self { pool })
    }

    async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(pool).await?;
        Ok(())
    }

    fn aggregate_from_row(row: &SqliteRow) -> Result<TimingAggregate> {
        let count: i64 = row.try_get("sample_count")?;
        let last_updated: i64 = row.try_get("last_updated")?;

        Ok(TimingAggregate {
            process_type: row.try_get("process_type")?,
            avg_time_ms: row.try_get("avg_time_ms")?,
            count: u64::try_from(count)
                .map_err(|_| LibraryError::invalid_input("sample_count", count.to_string()))?,
            last_updated: DateTime::from_timestamp_millis(last_updated).ok_or_else(|| {
                LibraryError::invalid_input("last_updated", last_updated.to_string())
            })?,
        })
    }
}

#[async_trait]
impl TimingStore for SqliteTimingStore {
    async fn record_sample(
        &self,
        process_type: &str,
        elapsed_ms: f64,
        at: DateTime<Utc>,
    ) -> Result<TimingAggregate> {
        if process_type.is_empty() {
            return Err(LibraryError::invalid_input(
                "process_type",
                "Process type cannot be empty",
            ));
        }
        if !elapsed_ms.is_finite() || elapsed_ms < 0.0 {
            return Err(LibraryError::invalid_input(
                "elapsed_ms",
                format!("Invalid duration: {elapsed_ms}"),
            ));
        }

        let row = sqlx::query(
            r#"
            INSERT INTO processing_times (process_type, avg_time_ms, sample_count, last_updated)
            VALUES (?, ?, 1, ?)
            ON CONFLICT(process_type) DO UPDATE SET
                avg_time_ms = (processing_times.avg_time_ms * processing_times.sample_count
                    + excluded.avg_time_ms) / (processing_times.sample_count + 1),
                sample_count = processing_times.sample_count + 1,
                last_updated = excluded.last_updated
            RETURNING process_type, avg_time_ms, sample_count, last_updated
            "#,
        )
        .bind(process_type)
        .bind(elapsed_ms)
        .bind(at.timestamp_millis())
        .fetch_one(&self.pool)
        .await?;

        let aggregate = Self::aggregate_from_row(&row)?;
        debug!(
            process_type = %process_type,
            elapsed_ms,
            avg_time_ms = aggregate.avg_time_ms,
            count = aggregate.count,
            "Recorded processing time"
        );
        Ok(aggregate)
    }

    async fn averages(&self) -> Result<Vec<TimingAggregate>> {
        let rows = sqlx::query(
            "SELECT process_type, avg_time_ms, sample_count, last_updated \
             FROM processing_times ORDER BY process_type",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::aggregate_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_running_average() {
        let store = SqliteTimingStore::in_memory().await.unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 9, 12, 0, 0).unwrap();

        let first = store.record_sample("image_processing", 100.0, at).await.unwrap();
        assert_eq!(first.count, 1);
        assert!((first.avg_time_ms - 100.0).abs() < f64::EPSILON);

        store.record_sample("image_processing", 200.0, at).await.unwrap();
        let third = store.record_sample("image_processing", 600.0, at).await.unwrap();
        assert_eq!(third.count, 3);
        assert!((third.avg_time_ms - 300.0).abs() < 1e-9);
        assert_eq!(third.last_updated, at);
    }

    #[tokio::test]
    async fn test_averages_per_process_type() {
        let store = SqliteTimingStore::in_memory().await.unwrap();
        let at = Utc::now();

        store.record_sample("thumbnail", 10.0, at).await.unwrap();
        store.record_sample("image_processing", 50.0, at).await.unwrap();

        let averages = store.averages().await.unwrap();
        let types: Vec<&str> = averages.iter().map(|a| a.process_type.as_str()).collect();
        assert_eq!(types, vec!["image_processing", "thumbnail"]);
    }

    #[tokio::test]
    async fn test_rejects_invalid_samples() {
        let store = SqliteTimingStore::in_memory().await.unwrap();

        assert!(store.record_sample("", 1.0, Utc::now()).await.is_err());
        assert!(store.record_sample("x", -1.0, Utc::now()).await.is_err());
        assert!(store.record_sample("x", f64::NAN, Utc::now()).await.is_err());
        assert!(store.averages().await.unwrap().is_empty());
    }
}
