//! # Pipeline Configuration Module
//!
//! Typed configuration for the image pipeline core.
//!
//! ## Overview
//!
//! The configuration is assembled once at startup, either through
//! [`PipelineConfig::builder()`] or from named environment variables with
//! [`PipelineConfig::from_env()`]. Both paths run the same fail-fast validation:
//! a missing storage location or CDN domain is reported before any request is
//! served, naming the key that has to be provided.
//!
//! ## Required Values
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `S3_BUCKET_NAME` | Bucket holding originals and derivatives |
//! | `CLOUDFRONT_DOMAIN` | CDN host serving public asset URLs |
//! | `AWS_REGION` | Region of the bucket |
//!
//! ## Tunables (with defaults)
//!
//! | Key | Default |
//! |-----|---------|
//! | `USER_CACHE_TTL_SECS` | 3600 |
//! | `METADATA_CACHE_TTL_SECS` | 3600 |
//! | `PROGRESS_TTL_SECS` | 3600 |
//! | `PRESIGNED_URL_TTL_SECS` | 3600 |
//! | `ENFORCE_DAILY_LIMIT` | `false` |
//! | `EVENT_BUFFER_SIZE` | 256 |
//! | `CACHE_CAPACITY` | 10000 |
//! | `TIMING_PROCESS_TYPE` | `image_processing` |
//! | `TIMING_DATABASE_PATH` | unset (in-memory) |
//! | `MODEL_PATH` | unset; required by the server bootstrap |
//! | `MODEL_LABELS_PATH` | unset (built-in ImageNet labels) |
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::PipelineConfig;
//!
//! let config = PipelineConfig::builder()
//!     .bucket_name("uploads")
//!     .cdn_domain("d111111abcdef8.cloudfront.net")
//!     .region("ap-southeast-2")
//!     .enforce_daily_limit(true)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable names read by [`PipelineConfig::from_env`].
pub mod keys {
    pub const BUCKET_NAME: &str = "S3_BUCKET_NAME";
    pub const CDN_DOMAIN: &str = "CLOUDFRONT_DOMAIN";
    pub const REGION: &str = "AWS_REGION";
    pub const USER_CACHE_TTL: &str = "USER_CACHE_TTL_SECS";
    pub const METADATA_CACHE_TTL: &str = "METADATA_CACHE_TTL_SECS";
    pub const PROGRESS_TTL: &str = "PROGRESS_TTL_SECS";
    pub const PRESIGNED_URL_TTL: &str = "PRESIGNED_URL_TTL_SECS";
    pub const ENFORCE_DAILY_LIMIT: &str = "ENFORCE_DAILY_LIMIT";
    pub const EVENT_BUFFER_SIZE: &str = "EVENT_BUFFER_SIZE";
    pub const CACHE_CAPACITY: &str = "CACHE_CAPACITY";
    pub const TIMING_PROCESS_TYPE: &str = "TIMING_PROCESS_TYPE";
    pub const TIMING_DATABASE_PATH: &str = "TIMING_DATABASE_PATH";
    pub const MODEL_PATH: &str = "MODEL_PATH";
    pub const MODEL_LABELS_PATH: &str = "MODEL_LABELS_PATH";
}

/// Default lifetime of cached user records, metadata and progress snapshots.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Default lifetime of pre-signed URLs.
pub const DEFAULT_PRESIGNED_URL_TTL: Duration = Duration::from_secs(3600);

/// Longest lifetime object storage accepts for a pre-signed URL (7 days).
pub const MAX_PRESIGNED_URL_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;
pub const DEFAULT_TIMING_PROCESS_TYPE: &str = "image_processing";

/// Configuration for the image pipeline core.
///
/// Use [`PipelineConfigBuilder`] or [`PipelineConfig::from_env`] to construct
/// instances; both validate before returning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Bucket holding originals and derivatives
    pub bucket_name: String,

    /// CDN host serving public asset URLs, without scheme
    pub cdn_domain: String,

    /// Region of the bucket
    pub region: String,

    /// Lifetime of cached user records
    pub user_cache_ttl: Duration,

    /// Lifetime of cached image metadata
    pub metadata_cache_ttl: Duration,

    /// Lifetime of the last progress snapshot per user
    pub progress_ttl: Duration,

    /// Lifetime of minted upload/download URLs
    pub presigned_url_ttl: Duration,

    /// Reject work once a user's daily allowance is used up
    pub enforce_daily_limit: bool,

    /// Per-subscriber buffer of the event bus
    pub event_buffer_size: usize,

    /// Maximum entries of the in-process cache
    pub cache_capacity: usize,

    /// Label timing samples are aggregated under
    pub timing_process_type: String,

    /// SQLite file backing timing aggregates; in-memory when unset
    pub timing_database_path: Option<PathBuf>,

    /// ONNX classifier model file
    pub model_path: Option<PathBuf>,

    /// Newline-separated class labels overriding the built-in table
    pub model_labels_path: Option<PathBuf>,
}

impl PipelineConfig {
    /// Creates a new builder for constructing a `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Empty values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut builder = Self::builder();

        if let Some(value) = get(keys::BUCKET_NAME) {
            builder = builder.bucket_name(value);
        }
        if let Some(value) = get(keys::CDN_DOMAIN) {
            builder = builder.cdn_domain(value);
        }
        if let Some(value) = get(keys::REGION) {
            builder = builder.region(value);
        }
        if let Some(value) = get(keys::USER_CACHE_TTL) {
            builder = builder.user_cache_ttl(parse_secs(keys::USER_CACHE_TTL, &value)?);
        }
        if let Some(value) = get(keys::METADATA_CACHE_TTL) {
            builder = builder.metadata_cache_ttl(parse_secs(keys::METADATA_CACHE_TTL, &value)?);
        }
        if let Some(value) = get(keys::PROGRESS_TTL) {
            builder = builder.progress_ttl(parse_secs(keys::PROGRESS_TTL, &value)?);
        }
        if let Some(value) = get(keys::PRESIGNED_URL_TTL) {
            builder = builder.presigned_url_ttl(parse_secs(keys::PRESIGNED_URL_TTL, &value)?);
        }
        if let Some(value) = get(keys::ENFORCE_DAILY_LIMIT) {
            builder = builder.enforce_daily_limit(parse_bool(keys::ENFORCE_DAILY_LIMIT, &value)?);
        }
        if let Some(value) = get(keys::EVENT_BUFFER_SIZE) {
            builder = builder.event_buffer_size(parse_usize(keys::EVENT_BUFFER_SIZE, &value)?);
        }
        if let Some(value) = get(keys::CACHE_CAPACITY) {
            builder = builder.cache_capacity(parse_usize(keys::CACHE_CAPACITY, &value)?);
        }
        if let Some(value) = get(keys::TIMING_PROCESS_TYPE) {
            builder = builder.timing_process_type(value);
        }
        if let Some(value) = get(keys::TIMING_DATABASE_PATH) {
            builder = builder.timing_database_path(value);
        }
        if let Some(value) = get(keys::MODEL_PATH) {
            builder = builder.model_path(value);
        }
        if let Some(value) = get(keys::MODEL_LABELS_PATH) {
            builder = builder.model_labels_path(value);
        }

        builder.build()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Required values are non-empty
    /// - The CDN domain is a bare host (no scheme, no path)
    /// - Pre-signed URL lifetime is within what object storage accepts
    /// - Buffer and cache sizes are non-zero
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            (keys::BUCKET_NAME, &self.bucket_name),
            (keys::CDN_DOMAIN, &self.cdn_domain),
            (keys::REGION, &self.region),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{key} cannot be empty")));
            }
        }

        if self.cdn_domain.contains("://") || self.cdn_domain.trim_end_matches('/').contains('/') {
            return Err(Error::InvalidValue {
                key: keys::CDN_DOMAIN.to_string(),
                message: "expected a bare host name such as d111111abcdef8.cloudfront.net"
                    .to_string(),
            });
        }

        if self.presigned_url_ttl.is_zero() || self.presigned_url_ttl > MAX_PRESIGNED_URL_TTL {
            return Err(Error::InvalidValue {
                key: keys::PRESIGNED_URL_TTL.to_string(),
                message: format!(
                    "must be between 1 and {} seconds",
                    MAX_PRESIGNED_URL_TTL.as_secs()
                ),
            });
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.cache_capacity == 0 {
            return Err(Error::Config(
                "Cache capacity must be greater than 0".to_string(),
            ));
        }

        if self.timing_process_type.trim().is_empty() {
            return Err(Error::Config(
                "Timing process type cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| Error::InvalidValue {
            key: key.to_string(),
            message: format!("expected whole seconds: {e}"),
        })
}

fn parse_usize(key: &str, value: &str) -> Result<usize> {
    value.trim().parse::<usize>().map_err(|e| Error::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}

/// Builder for constructing [`PipelineConfig`] instances.
///
/// Required values have no default; [`build()`](PipelineConfigBuilder::build)
/// names the first one missing.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    bucket_name: Option<String>,
    cdn_domain: Option<String>,
    region: Option<String>,
    user_cache_ttl: Option<Duration>,
    metadata_cache_ttl: Option<Duration>,
    progress_ttl: Option<Duration>,
    presigned_url_ttl: Option<Duration>,
    enforce_daily_limit: bool,
    event_buffer_size: Option<usize>,
    cache_capacity: Option<usize>,
    timing_process_type: Option<String>,
    timing_database_path: Option<PathBuf>,
    model_path: Option<PathBuf>,
    model_labels_path: Option<PathBuf>,
}

impl PipelineConfigBuilder {
    pub fn bucket_name(mut self, name: impl Into<String>) -> Self {
        self.bucket_name = Some(name.into());
        self
    }

    /// Sets the CDN host, e.g. `d111111abcdef8.cloudfront.net`.
    pub fn cdn_domain(mut self, domain: impl Into<String>) -> Self {
        self.cdn_domain = Some(domain.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn user_cache_ttl(mut self, ttl: Duration) -> Self {
        self.user_cache_ttl = Some(ttl);
        self
    }

    pub fn metadata_cache_ttl(mut self, ttl: Duration) -> Self {
        self.metadata_cache_ttl = Some(ttl);
        self
    }

    pub fn progress_ttl(mut self, ttl: Duration) -> Self {
        self.progress_ttl = Some(ttl);
        self
    }

    pub fn presigned_url_ttl(mut self, ttl: Duration) -> Self {
        self.presigned_url_ttl = Some(ttl);
        self
    }

    /// Enable rejection of work past the user's daily allowance.
    ///
    /// Default: `false`
    pub fn enforce_daily_limit(mut self, enforce: bool) -> Self {
        self.enforce_daily_limit = enforce;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = Some(capacity);
        self
    }

    pub fn timing_process_type(mut self, process_type: impl Into<String>) -> Self {
        self.timing_process_type = Some(process_type.into());
        self
    }

    pub fn timing_database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.timing_database_path = Some(path.into());
        self
    }

    pub fn model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.model_path = Some(path.into());
        self
    }

    pub fn model_labels_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.model_labels_path = Some(path.into());
        self
    }

    /// Builds the final `PipelineConfig` instance.
    ///
    /// Returns an error naming the missing key when a required value was not
    /// provided, or the first validation failure otherwise.
    pub fn build(self) -> Result<PipelineConfig> {
        let bucket_name = self.bucket_name.ok_or_else(|| missing(keys::BUCKET_NAME))?;
        let cdn_domain = self.cdn_domain.ok_or_else(|| missing(keys::CDN_DOMAIN))?;
        let region = self.region.ok_or_else(|| missing(keys::REGION))?;

        let config = PipelineConfig {
            bucket_name,
            cdn_domain: cdn_domain.trim_end_matches('/').to_string(),
            region,
            user_cache_ttl: self.user_cache_ttl.unwrap_or(DEFAULT_CACHE_TTL),
            metadata_cache_ttl: self.metadata_cache_ttl.unwrap_or(DEFAULT_CACHE_TTL),
            progress_ttl: self.progress_ttl.unwrap_or(DEFAULT_CACHE_TTL),
            presigned_url_ttl: self.presigned_url_ttl.unwrap_or(DEFAULT_PRESIGNED_URL_TTL),
            enforce_daily_limit: self.enforce_daily_limit,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            cache_capacity: self.cache_capacity.unwrap_or(DEFAULT_CACHE_CAPACITY),
            timing_process_type: self
                .timing_process_type
                .unwrap_or_else(|| DEFAULT_TIMING_PROCESS_TYPE.to_string()),
            timing_database_path: self.timing_database_path,
            model_path: self.model_path,
            model_labels_path: self.model_labels_path,
        };

        config.validate()?;

        Ok(config)
    }
}

fn missing(key: &str) -> Error {
    Error::Config(format!("{key} is required but was not provided"))
}
