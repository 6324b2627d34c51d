//! # Library Module
//!
//! Owns the records the image pipeline reads and writes: users with their
//! daily usage counters, per-image metadata, and processing-time aggregates.
//!
//! ## Overview
//!
//! This module provides:
//! - Domain models shared across the workspace
//! - Repository traits for users, image metadata and timing aggregates
//! - In-memory repositories for local runs and tests
//! - A SQLite-backed timing store

pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{
    Analysis, ColorAnalysis, ColorShare, ImageMetadata, MetadataDraft, PreferredAnalysis,
    Prediction, Role, TimingAggregate, UsageCounters, UsageSnapshot, User, UserSettings,
};
pub use repositories::{
    InMemoryMetadataStore, InMemoryUserStore, MetadataStore, SqliteTimingStore, TimingStore,
    UserStore,
};
