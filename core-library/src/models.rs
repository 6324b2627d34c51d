//! Domain models for users, usage and image metadata
//!
//! Payload types that leave the service (metadata, analysis, usage snapshots)
//! serialize with camelCase field names, matching what browser clients read.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Roles and settings
// =============================================================================

/// Account tier; each tier implies a fixed daily allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Standard,
    Premium,
    Admin,
}

impl Role {
    /// Images a user of this tier may process per calendar day.
    pub fn daily_limit(self) -> u32 {
        match self {
            Role::Standard => 10,
            Role::Premium => 50,
            Role::Admin => 100,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Standard => "standard",
            Role::Premium => "premium",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(Role::Standard),
            "premium" => Ok(Role::Premium),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

/// Which analyses run for a user's images. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferredAnalysis {
    Color,
    Object,
    #[default]
    Both,
}

impl PreferredAnalysis {
    pub fn includes_color(self) -> bool {
        matches!(self, PreferredAnalysis::Color | PreferredAnalysis::Both)
    }

    pub fn includes_objects(self) -> bool {
        matches!(self, PreferredAnalysis::Object | PreferredAnalysis::Both)
    }
}

impl FromStr for PreferredAnalysis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "color" => Ok(PreferredAnalysis::Color),
            "object" => Ok(PreferredAnalysis::Object),
            "both" => Ok(PreferredAnalysis::Both),
            other => Err(format!("Unknown analysis preference: {other}")),
        }
    }
}

/// Per-user processing preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    /// Enhancement intensity, unbounded above
    pub enhancement_level: u32,
    pub preferred_analysis: PreferredAnalysis,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            enhancement_level: 1,
            preferred_analysis: PreferredAnalysis::Both,
        }
    }
}

// =============================================================================
// Users and usage
// =============================================================================

/// A registered user and their daily usage counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Canonical (trimmed, lowercase) username
    pub username: String,
    pub role: Role,
    pub daily_limit: u32,
    /// Persisted counter; only meaningful on `last_processed_date`
    pub images_processed: u32,
    pub last_processed_date: Option<NaiveDate>,
    pub settings: UserSettings,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a user with the limit implied by `role` and default settings.
    pub fn new(username: &str, role: Role, created_at: DateTime<Utc>) -> Self {
        Self {
            username: Self::canonical_username(username),
            role,
            daily_limit: role.daily_limit(),
            images_processed: 0,
            last_processed_date: None,
            settings: UserSettings::default(),
            created_at,
        }
    }

    /// Canonical form usernames are stored and looked up under.
    pub fn canonical_username(raw: &str) -> String {
        raw.trim().to_lowercase()
    }

    /// Counter as it applies to `today`: a counter last touched on an earlier
    /// day counts as zero.
    pub fn effective_images_processed(&self, today: NaiveDate) -> u32 {
        match self.last_processed_date {
            Some(date) if date == today => self.images_processed,
            _ => 0,
        }
    }

    pub fn remaining_allowance(&self, today: NaiveDate) -> u32 {
        self.daily_limit
            .saturating_sub(self.effective_images_processed(today))
    }

    pub fn has_reached_limit(&self, today: NaiveDate) -> bool {
        self.effective_images_processed(today) >= self.daily_limit
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.username.is_empty() {
            return Err("Username cannot be empty".to_string());
        }

        if self.username != Self::canonical_username(&self.username) {
            return Err(format!("Username {} is not canonical", self.username));
        }

        if self.daily_limit == 0 {
            return Err("Daily limit must be positive".to_string());
        }

        Ok(())
    }
}

/// Counters as returned by the store's atomic increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCounters {
    pub images_processed: u32,
    pub daily_limit: u32,
    pub last_processed_date: NaiveDate,
}

impl UsageCounters {
    /// Whether these counters belong to a day before `today`.
    pub fn is_stale(&self, today: NaiveDate) -> bool {
        self.last_processed_date < today
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot::new(self.images_processed, self.daily_limit)
    }
}

/// Usage state reported back to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub images_processed: u32,
    pub daily_limit: u32,
    pub remaining_uploads: u32,
}

impl UsageSnapshot {
    pub fn new(images_processed: u32, daily_limit: u32) -> Self {
        Self {
            images_processed,
            daily_limit,
            remaining_uploads: daily_limit.saturating_sub(images_processed),
        }
    }
}

// =============================================================================
// Analysis payload
// =============================================================================

/// One bucket of the reduced color histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorShare {
    /// `#rrggbb`, lowercase
    pub color: String,
    /// Share of all pixels, 0 to 100 with two decimals
    pub percentage: f64,
}

/// Dominant colors of an image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorAnalysis {
    pub dominant_colors: Vec<ColorShare>,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ColorAnalysis {
    /// Result standing in for an analysis that could not run.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            dominant_colors: Vec::new(),
            width: 0,
            height: 0,
            error: Some(message.into()),
        }
    }
}

/// A label and its probability from the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub class_name: String,
    pub probability: f32,
}

/// Analyses run for one image; which fields are present follows the user's
/// [`PreferredAnalysis`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_analysis: Option<ColorAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_classification: Option<Vec<Prediction>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_classification: Option<Vec<Prediction>>,
}

// =============================================================================
// Image metadata
// =============================================================================

/// Fields the pipeline writes on every processing pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataDraft {
    pub user_id: String,
    pub original_image_url: String,
    pub enhanced_image_url: String,
    pub analysis: Analysis,
    pub user_settings: UserSettings,
}

/// Persisted result of processing one image, keyed by (owner, filename).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub user_id: String,
    pub original_filename: String,
    pub original_image_url: String,
    pub enhanced_image_url: String,
    pub analysis: Analysis,
    pub user_settings: UserSettings,
    pub processed_at: DateTime<Utc>,
    /// Number of times this filename has been processed
    pub process_count: u32,
}

impl ImageMetadata {
    pub fn from_draft(
        original_filename: &str,
        draft: MetadataDraft,
        processed_at: DateTime<Utc>,
        process_count: u32,
    ) -> Self {
        Self {
            user_id: draft.user_id,
            original_filename: original_filename.to_string(),
            original_image_url: draft.original_image_url,
            enhanced_image_url: draft.enhanced_image_url,
            analysis: draft.analysis,
            user_settings: draft.user_settings,
            processed_at,
            process_count,
        }
    }

    pub fn processed_on(&self, day: NaiveDate) -> bool {
        self.processed_at.date_naive() == day
    }
}

// =============================================================================
// Timing aggregates
// =============================================================================

/// Running average of processing time for one process type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingAggregate {
    pub process_type: String,
    pub avg_time_ms: f64,
    pub count: u64,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_role_limits() {
        assert_eq!(Role::Standard.daily_limit(), 10);
        assert_eq!(Role::Premium.daily_limit(), 50);
        assert_eq!(Role::Admin.daily_limit(), 100);
        assert_eq!("Premium".parse::<Role>().unwrap(), Role::Premium);
        assert!("guest".parse::<Role>().is_err());
    }

    #[test]
    fn test_user_new() {
        let user = User::new("  Alice ", Role::Premium, created());
        assert_eq!(user.username, "alice");
        assert_eq!(user.daily_limit, 50);
        assert_eq!(user.images_processed, 0);
        assert_eq!(user.last_processed_date, None);
        assert_eq!(user.settings, UserSettings::default());
        assert_eq!(user.settings.enhancement_level, 1);
        assert_eq!(user.settings.preferred_analysis, PreferredAnalysis::Both);
        assert!(user.validate().is_ok());
    }

    #[test]
    fn test_user_validation() {
        let mut user = User::new("bob", Role::Standard, created());
        user.username = "Bob".to_string();
        assert!(user.validate().is_err());

        user.username = String::new();
        assert!(user.validate().is_err());

        user.username = "bob".to_string();
        user.daily_limit = 0;
        assert!(user.validate().is_err());
    }

    #[test]
    fn test_effective_counter_resets_on_new_day() {
        let mut user = User::new("carol", Role::Standard, created());
        user.images_processed = 7;
        user.last_processed_date = Some(day(9));

        assert_eq!(user.effective_images_processed(day(9)), 7);
        assert_eq!(user.remaining_allowance(day(9)), 3);

        assert_eq!(user.effective_images_processed(day(10)), 0);
        assert_eq!(user.remaining_allowance(day(10)), 10);
        assert!(!user.has_reached_limit(day(10)));

        user.images_processed = 12;
        assert!(user.has_reached_limit(day(9)));
        assert_eq!(user.remaining_allowance(day(9)), 0);
    }

    #[test]
    fn test_preferred_analysis_selection() {
        assert!(PreferredAnalysis::Color.includes_color());
        assert!(!PreferredAnalysis::Color.includes_objects());
        assert!(PreferredAnalysis::Object.includes_objects());
        assert!(!PreferredAnalysis::Object.includes_color());
        assert!(PreferredAnalysis::Both.includes_color() && PreferredAnalysis::Both.includes_objects());
        assert_eq!("OBJECT".parse::<PreferredAnalysis>().unwrap(), PreferredAnalysis::Object);
    }

    #[test]
    fn test_usage_snapshot_never_negative() {
        let snapshot = UsageSnapshot::new(12, 10);
        assert_eq!(snapshot.remaining_uploads, 0);

        let counters = UsageCounters {
            images_processed: 3,
            daily_limit: 10,
            last_processed_date: day(9),
        };
        assert!(counters.is_stale(day(10)));
        assert!(!counters.is_stale(day(9)));
        assert_eq!(counters.snapshot().remaining_uploads, 7);
    }

    #[test]
    fn test_analysis_omits_absent_fields() {
        let analysis = Analysis {
            color_analysis: Some(ColorAnalysis::failed("decode error")),
            ..Analysis::default()
        };

        let json = serde_json::to_value(&analysis).unwrap();
        assert!(json.get("colorAnalysis").is_some());
        assert!(json.get("originalClassification").is_none());
        assert!(json.get("enhancedClassification").is_none());
        assert_eq!(json["colorAnalysis"]["dominantColors"], serde_json::json!([]));
        assert_eq!(json["colorAnalysis"]["error"], "decode error");
    }

    #[test]
    fn test_metadata_from_draft() {
        let draft = MetadataDraft {
            user_id: "alice".to_string(),
            original_image_url: "https://cdn/originals/a.jpg".to_string(),
            enhanced_image_url: "https://cdn/enhanced/enhanced_a.jpg".to_string(),
            analysis: Analysis::default(),
            user_settings: UserSettings::default(),
        };
        let at = Utc.with_ymd_and_hms(2024, 5, 9, 23, 0, 0).unwrap();
        let metadata = ImageMetadata::from_draft("a.jpg", draft, at, 3);

        assert_eq!(metadata.original_filename, "a.jpg");
        assert_eq!(metadata.process_count, 3);
        assert!(metadata.processed_on(day(9)));
        assert!(!metadata.processed_on(day(10)));
    }
}
