//! # Pipeline Module
//!
//! Orchestrates image processing for a user: single images and sequential
//! batches, with progress reporting, cache-through lookups and daily usage
//! accounting.
//!
//! ## Overview
//!
//! - [`ImagePipeline`]: `process_one`, `process_batch`, `image_metadata`
//! - [`ProgressReporter`]: cached progress snapshots plus live push
//! - [`UsageTracker`]: user resolution, allowance checks, counter updates
//! - [`keys`]: cache key layout shared with the service layer

pub mod cache;
pub mod error;
pub mod keys;
pub mod pipeline;
pub mod progress;
pub mod usage;

pub use cache::JsonCache;
pub use error::{PipelineError, Result};
pub use pipeline::{BatchOutcome, ImagePipeline, PipelineDependencies, ProcessedImage};
pub use progress::{Checkpoint, ProgressMode, ProgressReporter};
pub use usage::UsageTracker;
