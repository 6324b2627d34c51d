//! User registration, settings and per-user statistics

use crate::error::{CoreError, Result};
use crate::CoreService;
use core_library::models::{PreferredAnalysis, Role, User, UserSettings};
use core_pipeline::keys::user_key;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Usage figures shown on a user's dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    /// Counter as it applies today
    pub total_images_processed: u32,
    /// Metadata records of this user last processed today
    pub images_processed_today: u32,
    pub remaining_daily_limit: u32,
}

impl CoreService {
    /// Create a user with the limit implied by `role` and default settings.
    ///
    /// # Errors
    /// `AlreadyExists` (409) if the canonical username is taken.
    pub async fn register_user(&self, username: &str, role: Role) -> Result<User> {
        let user = User::new(username, role, self.clock.now());
        if user.username.is_empty() {
            return Err(CoreError::InvalidInput("Username cannot be empty".to_string()));
        }

        self.users.create(&user).await?;
        info!(username = %user.username, role = %role, "Registered user");
        Ok(user)
    }

    /// Fetch a user, creating a standard account on first access.
    pub async fn ensure_user(&self, username: &str) -> Result<User> {
        let canonical = User::canonical_username(username);
        if let Some(user) = self.users.get(&canonical).await? {
            return Ok(user);
        }

        match self.register_user(&canonical, Role::Standard).await {
            Ok(user) => Ok(user),
            // Lost a race with a concurrent first access
            Err(CoreError::Library(core_library::LibraryError::AlreadyExists { .. })) => self
                .users
                .get(&canonical)
                .await?
                .ok_or(CoreError::UserNotFound(canonical)),
            Err(e) => Err(e),
        }
    }

    /// Change a user's processing preferences; omitted values are kept.
    ///
    /// The cached user record is refreshed so the next run picks the new
    /// settings up.
    pub async fn update_settings(
        &self,
        username: &str,
        enhancement_level: Option<u32>,
        preferred_analysis: Option<PreferredAnalysis>,
    ) -> Result<User> {
        let canonical = User::canonical_username(username);
        let current = self
            .users
            .get(&canonical)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(canonical.clone()))?;

        let settings = UserSettings {
            enhancement_level: enhancement_level.unwrap_or(current.settings.enhancement_level),
            preferred_analysis: preferred_analysis.unwrap_or(current.settings.preferred_analysis),
        };
        let updated = self.users.update_settings(&canonical, settings).await?;

        if let Err(e) = self
            .cache
            .set(&user_key(&canonical), &updated, self.config.user_cache_ttl)
            .await
        {
            warn!(username = %canonical, error = %e, "Failed to refresh cached user");
        }

        info!(
            username = %canonical,
            enhancement_level = settings.enhancement_level,
            preferred_analysis = ?settings.preferred_analysis,
            "Updated user settings"
        );
        Ok(updated)
    }

    /// Today's usage for a user.
    pub async fn user_stats(&self, username: &str) -> Result<UserStats> {
        let canonical = User::canonical_username(username);
        let user = self
            .users
            .get(&canonical)
            .await?
            .ok_or_else(|| CoreError::UserNotFound(canonical.clone()))?;
        let today = self.clock.today();

        let images_processed_today = self
            .metadata
            .list()
            .await?
            .iter()
            .filter(|record| record.user_id == canonical && record.processed_on(today))
            .count();

        Ok(UserStats {
            total_images_processed: user.effective_images_processed(today),
            images_processed_today: u32::try_from(images_processed_today).unwrap_or(u32::MAX),
            remaining_daily_limit: user.remaining_allowance(today),
        })
    }
}
