//! Progress Push Channel
//!
//! Fire-and-forget delivery of pipeline progress to live browser subscriptions.

use serde::{Deserialize, Serialize};

/// Stage label used by the terminal record of a failed run.
pub const ERROR_STAGE: &str = "error";

/// Snapshot of how far a user's current run has got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Percentage complete, 0 to 100
    pub progress: u8,
    /// Free-text stage label
    pub stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressRecord {
    pub fn new(progress: u8, stage: impl Into<String>) -> Self {
        Self {
            progress: progress.min(100),
            stage: stage.into(),
            error: None,
        }
    }

    /// Terminal record for a run that failed.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            progress: 0,
            stage: ERROR_STAGE.to_string(),
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Progress channel trait
///
/// Delivers a record to zero or more live subscribers of `user_id`. Publishing
/// never blocks and never fails: with nobody listening the record is dropped.
pub trait ProgressChannel: Send + Sync {
    fn publish(&self, user_id: &str, record: ProgressRecord);
}
