//! User resolution and daily usage accounting

use crate::cache::JsonCache;
use crate::error::{PipelineError, Result};
use crate::keys::user_key;
use bridge_traits::time::Clock;
use core_library::models::{UsageSnapshot, User};
use core_library::repositories::UserStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Resolves users through the cache and keeps the authoritative counters.
#[derive(Clone)]
pub struct UsageTracker {
    users: Arc<dyn UserStore>,
    cache: JsonCache,
    user_ttl: Duration,
    clock: Arc<dyn Clock>,
    enforce_daily_limit: bool,
}

impl UsageTracker {
    pub fn new(
        users: Arc<dyn UserStore>,
        cache: JsonCache,
        user_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            cache,
            user_ttl,
            clock,
            enforce_daily_limit: false,
        }
    }

    pub fn with_enforcement(mut self, enforce: bool) -> Self {
        self.enforce_daily_limit = enforce;
        self
    }

    /// Cache-first user lookup; a store hit repopulates the cache.
    pub async fn resolve_user(&self, username: &str) -> Result<User> {
        let key = user_key(username);
        match self.cache.get::<User>(&key).await {
            Ok(Some(user)) => return Ok(user),
            Ok(None) => {}
            Err(e) => warn!(username = %username, error = %e, "User cache read failed"),
        }

        let user = self
            .users
            .get(username)
            .await?
            .ok_or_else(|| PipelineError::UserNotFound(username.to_string()))?;

        if let Err(e) = self.cache.set(&key, &user, self.user_ttl).await {
            warn!(username = %username, error = %e, "Failed to cache user");
        }
        debug!(username = %username, "Resolved user from store");
        Ok(user)
    }

    /// Reject the request if the user has used up today's allowance.
    ///
    /// No-op unless enforcement is enabled. The decision uses `last` (the
    /// counters returned by this run's previous increment) when present, and
    /// otherwise re-reads the store; cached user records are never consulted.
    pub async fn check_allowance(&self, username: &str, last: Option<&UsageSnapshot>) -> Result<()> {
        if !self.enforce_daily_limit {
            return Ok(());
        }

        let (processed, daily_limit) = match last {
            Some(snapshot) => (snapshot.images_processed, snapshot.daily_limit),
            None => {
                let user = self
                    .users
                    .get(username)
                    .await?
                    .ok_or_else(|| PipelineError::UserNotFound(username.to_string()))?;
                (
                    user.effective_images_processed(self.clock.today()),
                    user.daily_limit,
                )
            }
        };

        if processed >= daily_limit {
            info!(username = %username, processed, daily_limit, "Daily limit reached");
            return Err(PipelineError::LimitExceeded {
                username: username.to_string(),
                daily_limit,
            });
        }
        Ok(())
    }

    /// Count one processed image against today's allowance.
    ///
    /// When the increment lands on counters from an earlier day, the counters
    /// are reset to one for today.
    pub async fn record_processed(&self, username: &str) -> Result<UsageSnapshot> {
        let today = self.clock.today();
        let mut counters = self.users.increment_usage(username, today).await?;

        if counters.is_stale(today) {
            info!(
                username = %username,
                last_processed_date = %counters.last_processed_date,
                "Day rolled over, resetting usage counter"
            );
            counters = self.users.reset_usage(username, today).await?;
        }

        Ok(counters.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_server::LruTtlCache;
    use bridge_traits::time::FixedClock;
    use chrono::{NaiveDate, TimeZone, Utc};
    use core_library::models::{Role, UsageCounters, UserSettings};
    use core_library::Result as LibraryResult;
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        Users {}

        #[async_trait]
        impl UserStore for Users {
            async fn get(&self, username: &str) -> LibraryResult<Option<User>>;
            async fn create(&self, user: &User) -> LibraryResult<()>;
            async fn update_settings(&self, username: &str, settings: UserSettings) -> LibraryResult<User>;
            async fn increment_usage(&self, username: &str, today: NaiveDate) -> LibraryResult<UsageCounters>;
            async fn reset_usage(&self, username: &str, today: NaiveDate) -> LibraryResult<UsageCounters>;
            async fn list(&self) -> LibraryResult<Vec<User>>;
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn yesterday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 9).unwrap()
    }

    fn tracker(users: MockUsers) -> UsageTracker {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 5, 10, 9, 30, 0).unwrap(),
        ));
        UsageTracker::new(
            Arc::new(users),
            JsonCache::new(Arc::new(LruTtlCache::new(8))),
            Duration::from_secs(3600),
            clock,
        )
    }

    fn user_with(processed: u32, last: Option<NaiveDate>) -> User {
        let mut user = User::new("alice", Role::Standard, Utc::now());
        user.images_processed = processed;
        user.last_processed_date = last;
        user
    }

    #[tokio::test]
    async fn test_stale_increment_is_corrected() {
        let mut users = MockUsers::new();
        users
            .expect_increment_usage()
            .with(eq("alice"), eq(today()))
            .times(1)
            .returning(|_, _| {
                Ok(UsageCounters {
                    images_processed: 8,
                    daily_limit: 10,
                    last_processed_date: yesterday(),
                })
            });
        users
            .expect_reset_usage()
            .with(eq("alice"), eq(today()))
            .times(1)
            .returning(|_, today| {
                Ok(UsageCounters {
                    images_processed: 1,
                    daily_limit: 10,
                    last_processed_date: today,
                })
            });

        let snapshot = tracker(users).record_processed("alice").await.unwrap();
        assert_eq!(snapshot, UsageSnapshot::new(1, 10));
        assert_eq!(snapshot.remaining_uploads, 9);
    }

    #[tokio::test]
    async fn test_current_increment_is_kept() {
        let mut users = MockUsers::new();
        users.expect_increment_usage().times(1).returning(|_, today| {
            Ok(UsageCounters {
                images_processed: 4,
                daily_limit: 10,
                last_processed_date: today,
            })
        });
        users.expect_reset_usage().never();

        let snapshot = tracker(users).record_processed("alice").await.unwrap();
        assert_eq!(snapshot.images_processed, 4);
        assert_eq!(snapshot.remaining_uploads, 6);
    }

    #[tokio::test]
    async fn test_resolve_user_caches_store_hit() {
        let mut users = MockUsers::new();
        users
            .expect_get()
            .with(eq("alice"))
            .times(1)
            .returning(|_| Ok(Some(user_with(0, None))));

        let tracker = tracker(users);
        let first = tracker.resolve_user("alice").await.unwrap();
        let second = tracker.resolve_user("alice").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_resolve_unknown_user() {
        let mut users = MockUsers::new();
        users.expect_get().returning(|_| Ok(None));

        let err = tracker(users).resolve_user("ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_allowance_ignored_when_not_enforced() {
        let mut users = MockUsers::new();
        users.expect_get().never();

        assert!(tracker(users).check_allowance("alice", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_allowance_uses_store_with_rollover() {
        let mut users = MockUsers::new();
        users
            .expect_get()
            .returning(|_| Ok(Some(user_with(10, Some(yesterday())))));
        let tracker = tracker(users).with_enforcement(true);

        // Ten images yesterday leave the full allowance today
        assert!(tracker.check_allowance("alice", None).await.is_ok());

        let exhausted = UsageSnapshot::new(10, 10);
        let err = tracker
            .check_allowance("alice", Some(&exhausted))
            .await
            .unwrap_err();
        assert!(err.is_limit_exceeded());
    }

    #[tokio::test]
    async fn test_allowance_rejects_exhausted_user() {
        let mut users = MockUsers::new();
        users
            .expect_get()
            .returning(|_| Ok(Some(user_with(10, Some(today())))));

        let err = tracker(users)
            .with_enforcement(true)
            .check_allowance("alice", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::LimitExceeded { daily_limit: 10, .. }));
    }
}
