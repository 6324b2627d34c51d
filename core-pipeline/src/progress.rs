//! Progress reporting
//!
//! Every record is written to the cache (so a client connecting mid-run can
//! fetch the latest snapshot) and pushed to live subscribers. Neither path is
//! allowed to fail the pipeline.

use crate::cache::JsonCache;
use crate::keys::progress_key;
use bridge_traits::error::Result;
use bridge_traits::push::{ProgressChannel, ProgressRecord};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const COMPLETE_STAGE: &str = "complete";

/// Fixed points a single image passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Starting,
    Enhancing,
    Analyzing,
    SavingResults,
    SavingMetadata,
    Complete,
}

impl Checkpoint {
    pub fn percent(self) -> u8 {
        match self {
            Checkpoint::Starting => 0,
            Checkpoint::Enhancing => 20,
            Checkpoint::Analyzing => 40,
            Checkpoint::SavingResults => 60,
            Checkpoint::SavingMetadata => 80,
            Checkpoint::Complete => 100,
        }
    }

    pub fn stage(self) -> &'static str {
        match self {
            Checkpoint::Starting => "starting",
            Checkpoint::Enhancing => "enhancing",
            Checkpoint::Analyzing => "analyzing",
            Checkpoint::SavingResults => "saving results",
            Checkpoint::SavingMetadata => "saving metadata",
            Checkpoint::Complete => COMPLETE_STAGE,
        }
    }
}

/// How an image's checkpoints are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Checkpoints are reported as they are.
    Single,
    /// Checkpoints are scaled into one running percentage for the batch.
    Batch { index: usize, total: usize },
}

impl ProgressMode {
    pub fn record(self, checkpoint: Checkpoint) -> ProgressRecord {
        match self {
            ProgressMode::Single => ProgressRecord::new(checkpoint.percent(), checkpoint.stage()),
            ProgressMode::Batch { index, total } => {
                let total = total.max(1);
                let overall = (index * 100 + usize::from(checkpoint.percent())) / total;
                ProgressRecord::new(
                    u8::try_from(overall).unwrap_or(100),
                    format!("processing file {} of {}", index + 1, total),
                )
            }
        }
    }
}

/// Publishes progress to the cache snapshot and the live channel.
#[derive(Clone)]
pub struct ProgressReporter {
    cache: JsonCache,
    channel: Arc<dyn ProgressChannel>,
    ttl: Duration,
}

impl ProgressReporter {
    pub fn new(cache: JsonCache, channel: Arc<dyn ProgressChannel>, ttl: Duration) -> Self {
        Self {
            cache,
            channel,
            ttl,
        }
    }

    pub async fn checkpoint(&self, user_id: &str, mode: ProgressMode, checkpoint: Checkpoint) {
        self.publish(user_id, mode.record(checkpoint)).await;
    }

    pub async fn publish(&self, user_id: &str, record: ProgressRecord) {
        if let Err(e) = self.cache.set(&progress_key(user_id), &record, self.ttl).await {
            warn!(user_id = %user_id, error = %e, "Failed to cache progress snapshot");
        }
        self.channel.publish(user_id, record);
    }

    /// Last progress snapshot written for `user_id`, if it has not expired.
    pub async fn latest(&self, user_id: &str) -> Result<Option<ProgressRecord>> {
        self.cache.get(&progress_key(user_id)).await
    }
}
