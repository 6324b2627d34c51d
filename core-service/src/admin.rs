//! Administrator views across all users

use crate::error::Result;
use crate::CoreService;
use core_library::models::{TimingAggregate, User};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: u64,
    /// Sum of every user's stored counter
    pub total_images_processed: u64,
    /// Sum of process counts of images last processed today
    pub images_processed_today: u64,
}

impl CoreService {
    pub async fn admin_stats(&self) -> Result<AdminStats> {
        let users = self.users.list().await?;
        let today = self.clock.today();

        let images_processed_today = self
            .metadata
            .list()
            .await?
            .iter()
            .filter(|record| record.processed_on(today))
            .map(|record| u64::from(record.process_count))
            .sum();

        Ok(AdminStats {
            total_users: users.len() as u64,
            total_images_processed: users
                .iter()
                .map(|user| u64::from(user.images_processed))
                .sum(),
            images_processed_today,
        })
    }

    /// All users, ordered by username.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let mut users = self.users.list().await?;
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    /// Running processing-time averages per process type.
    pub async fn processing_times(&self) -> Result<Vec<TimingAggregate>> {
        Ok(self.timings.averages().await?)
    }
}
