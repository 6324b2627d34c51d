use crate::error::{LibraryError, Result};
use crate::models::{UsageCounters, User, UserSettings};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// User repository interface
///
/// Usernames passed in are expected in canonical form
/// (see [`User::canonical_username`]).
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by username
    ///
    /// # Returns
    /// - `Ok(Some(user))` if found
    /// - `Ok(None)` if not found
    async fn get(&self, username: &str) -> Result<Option<User>>;

    /// Insert a new user
    ///
    /// # Errors
    /// Returns `AlreadyExists` if the username is taken, `InvalidInput` if the
    /// record fails validation.
    async fn create(&self, user: &User) -> Result<()>;

    /// Replace a user's settings and return the updated record
    ///
    /// # Errors
    /// Returns `NotFound` if the user does not exist.
    async fn update_settings(&self, username: &str, settings: UserSettings) -> Result<User>;

    /// Atomically add one to the usage counter
    ///
    /// The last-processed date is set to `today` only when it is absent; a
    /// stale date is left for the caller to correct with [`reset_usage`].
    ///
    /// # Returns
    /// The counters as they stand after the increment.
    ///
    /// [`reset_usage`]: UserStore::reset_usage
    async fn increment_usage(&self, username: &str, today: NaiveDate) -> Result<UsageCounters>;

    /// Set the counter to one and the last-processed date to `today`
    async fn reset_usage(&self, username: &str, today: NaiveDate) -> Result<UsageCounters>;

    /// All users, in no particular order
    async fn list(&self) -> Result<Vec<User>>;
}

/// [`UserStore`] held in process memory.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn missing(username: &str) -> LibraryError {
        LibraryError::not_found("User", username)
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self, username: &str) -> Result<Option<User>> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn create(&self, user: &User) -> Result<()> {
        user.validate()
            .map_err(|message| LibraryError::invalid_input("user", message))?;

        let mut users = self.users.write().await;
        if users.contains_key(&user.username) {
            return Err(LibraryError::AlreadyExists {
                entity_type: "User".to_string(),
                id: user.username.clone(),
            });
        }

        users.insert(user.username.clone(), user.clone());
        debug!(username = %user.username, role = %user.role, "Created user");
        Ok(())
    }

    async fn update_settings(&self, username: &str, settings: UserSettings) -> Result<User> {
        let mut users = self.users.write().await;
        let user = users.get_mut(username).ok_or_else(|| Self::missing(username))?;
        user.settings = settings;
        Ok(user.clone())
    }

    async fn increment_usage(&self, username: &str, today: NaiveDate) -> Result<UsageCounters> {
        let mut users = self.users.write().await;
        let user = users.get_mut(username).ok_or_else(|| Self::missing(username))?;

        user.images_processed = user.images_processed.saturating_add(1);
        let last_processed_date = *user.last_processed_date.get_or_insert(today);

        Ok(UsageCounters {
            images_processed: user.images_processed,
            daily_limit: user.daily_limit,
            last_processed_date,
        })
    }

    async fn reset_usage(&self, username: &str, today: NaiveDate) -> Result<UsageCounters> {
        let mut users = self.users.write().await;
        let user = users.get_mut(username).ok_or_else(|| Self::missing(username))?;

        user.images_processed = 1;
        user.last_processed_date = Some(today);

        Ok(UsageCounters {
            images_processed: 1,
            daily_limit: user.daily_limit,
            last_processed_date: today,
        })
    }

    async fn list(&self) -> Result<Vec<User>> {
        Ok(self.users.read().await.values().cloned().collect())
    }
}
