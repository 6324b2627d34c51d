//! Image pipeline orchestration
//!
//! One image runs through a fixed sequence: resolve the user, fetch the
//! original, enhance, analyze, upload the derivative, persist and cache the
//! metadata, count usage, record timing. Batches run images one after another
//! and stop at the first failure; images already processed keep their side
//! effects.

use crate::cache::JsonCache;
use crate::error::{PipelineError, Result};
use crate::keys::image_key;
use crate::progress::{Checkpoint, ProgressMode, ProgressReporter, COMPLETE_STAGE};
use crate::usage::UsageTracker;
use bridge_traits::cache::CacheStore;
use bridge_traits::push::{ProgressChannel, ProgressRecord};
use bridge_traits::storage::{derivative_name, ObjectStorage, DERIVATIVE_CONTENT_TYPE};
use bridge_traits::time::Clock;
use bytes::Bytes;
use core_imaging::{analyze_colors, enhance, preprocess, run_blocking, Classifier};
use core_library::models::{
    Analysis, ImageMetadata, MetadataDraft, PreferredAnalysis, UsageSnapshot, User,
};
use core_library::repositories::{MetadataStore, TimingStore, UserStore};
use core_runtime::config::PipelineConfig;
use core_runtime::events::{CoreEvent, EventBus, PipelineEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

// =============================================================================
// Results
// =============================================================================

/// Outcome of processing one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedImage {
    #[serde(flatten)]
    pub metadata: ImageMetadata,
    #[serde(rename = "updatedUserInfo")]
    pub updated_usage: UsageSnapshot,
    #[serde(rename = "remainingUploads")]
    pub remaining_allowance: u32,
}

/// Outcome of a batch: per-image results in request order and the usage
/// reported by the last image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub results: Vec<ProcessedImage>,
    #[serde(rename = "updatedUserInfo")]
    pub updated_usage: UsageSnapshot,
}

// =============================================================================
// Pipeline
// =============================================================================

/// Collaborators the pipeline runs against.
pub struct PipelineDependencies {
    pub storage: Arc<dyn ObjectStorage>,
    pub cache: Arc<dyn CacheStore>,
    pub progress: Arc<dyn ProgressChannel>,
    pub users: Arc<dyn UserStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub timings: Arc<dyn TimingStore>,
    pub classifier: Classifier,
    pub clock: Arc<dyn Clock>,
}

pub struct ImagePipeline {
    config: Arc<PipelineConfig>,
    storage: Arc<dyn ObjectStorage>,
    cache: JsonCache,
    progress: ProgressReporter,
    usage: UsageTracker,
    metadata: Arc<dyn MetadataStore>,
    timings: Arc<dyn TimingStore>,
    classifier: Classifier,
    clock: Arc<dyn Clock>,
    events: Option<Arc<EventBus>>,
}

impl ImagePipeline {
    pub fn new(config: Arc<PipelineConfig>, deps: PipelineDependencies) -> Self {
        let cache = JsonCache::new(deps.cache);
        let progress = ProgressReporter::new(cache.clone(), deps.progress, config.progress_ttl);
        let usage = UsageTracker::new(
            deps.users,
            cache.clone(),
            config.user_cache_ttl,
            Arc::clone(&deps.clock),
        )
        .with_enforcement(config.enforce_daily_limit);

        Self {
            config,
            storage: deps.storage,
            cache,
            progress,
            usage,
            metadata: deps.metadata,
            timings: deps.timings,
            classifier: deps.classifier,
            clock: deps.clock,
            events: None,
        }
    }

    /// Publish lifecycle events (image processed, batch started/finished).
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process a single uploaded image for `username`.
    #[instrument(skip(self))]
    pub async fn process_one(&self, filename: &str, username: &str) -> Result<ProcessedImage> {
        let username = User::canonical_username(username);
        self.process_image(filename, &username, ProgressMode::Single, None)
            .await
    }

    /// Process images sequentially, failing on the first error.
    #[instrument(skip(self, filenames), fields(total = filenames.len()))]
    pub async fn process_batch(&self, filenames: &[String], username: &str) -> Result<BatchOutcome> {
        if filenames.is_empty() {
            return Err(PipelineError::EmptyBatch);
        }

        let username = User::canonical_username(username);
        let batch_id = Uuid::new_v4().to_string();
        let total = filenames.len();
        let started = Instant::now();

        info!(batch_id = %batch_id, "Starting batch");
        self.emit(PipelineEvent::BatchStarted {
            user_id: username.clone(),
            batch_id: batch_id.clone(),
            total,
        });

        let mut results: Vec<ProcessedImage> = Vec::with_capacity(total);
        for (index, filename) in filenames.iter().enumerate() {
            let mode = ProgressMode::Batch { index, total };
            let last_usage = results.last().map(|r| r.updated_usage);

            match self
                .process_image(filename, &username, mode, last_usage.as_ref())
                .await
            {
                Ok(result) => results.push(result),
                Err(e) => {
                    error!(
                        batch_id = %batch_id,
                        filename = %filename,
                        completed = results.len(),
                        error = %e,
                        "Batch aborted"
                    );
                    self.progress
                        .publish(&username, ProgressRecord::failed(e.to_string()))
                        .await;
                    self.emit(PipelineEvent::BatchFailed {
                        user_id: username.clone(),
                        batch_id,
                        filename: filename.clone(),
                        message: e.to_string(),
                        completed: results.len(),
                    });
                    return Err(e);
                }
            }
        }

        self.progress
            .publish(&username, ProgressRecord::new(100, COMPLETE_STAGE))
            .await;

        let updated_usage = results
            .last()
            .map(|r| r.updated_usage)
            .ok_or(PipelineError::EmptyBatch)?;

        info!(batch_id = %batch_id, images = total, "Batch complete");
        self.emit(PipelineEvent::BatchCompleted {
            user_id: username,
            batch_id,
            images: total,
            duration_ms: millis(started.elapsed()),
        });

        Ok(BatchOutcome {
            results,
            updated_usage,
        })
    }

    /// Metadata for a processed image, served from the cache when possible.
    pub async fn image_metadata(&self, username: &str, filename: &str) -> Result<Option<ImageMetadata>> {
        let username = User::canonical_username(username);
        let key = image_key(&username, filename);

        match self.cache.get::<ImageMetadata>(&key).await {
            Ok(Some(metadata)) => return Ok(Some(metadata)),
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Metadata cache read failed"),
        }

        let Some(metadata) = self.metadata.get(&username, filename).await? else {
            return Ok(None);
        };

        if let Err(e) = self
            .cache
            .set(&key, &metadata, self.config.metadata_cache_ttl)
            .await
        {
            warn!(key = %key, error = %e, "Failed to cache metadata");
        }
        Ok(Some(metadata))
    }

    /// Last progress snapshot for `user_id`, if one is still cached.
    pub async fn latest_progress(&self, user_id: &str) -> Result<Option<ProgressRecord>> {
        Ok(self
            .progress
            .latest(&User::canonical_username(user_id))
            .await?)
    }

    async fn process_image(
        &self,
        filename: &str,
        username: &str,
        mode: ProgressMode,
        last_usage: Option<&UsageSnapshot>,
    ) -> Result<ProcessedImage> {
        if filename.trim().is_empty() {
            return Err(PipelineError::EmptyFilename);
        }
        let started = Instant::now();

        self.progress
            .checkpoint(username, mode, Checkpoint::Starting)
            .await;

        let user = self.usage.resolve_user(username).await?;
        self.usage.check_allowance(username, last_usage).await?;
        let settings = user.settings;
        debug!(
            filename = %filename,
            enhancement_level = settings.enhancement_level,
            preferred_analysis = ?settings.preferred_analysis,
            "Resolved user settings"
        );

        self.progress
            .checkpoint(username, mode, Checkpoint::Enhancing)
            .await;
        let original = self
            .storage
            .fetch(filename)
            .await
            .map_err(PipelineError::upstream("fetch original"))?;
        let enhanced = {
            let source = original.clone();
            let level = settings.enhancement_level;
            Bytes::from(run_blocking(move || enhance(&source, level)).await?)
        };

        self.progress
            .checkpoint(username, mode, Checkpoint::Analyzing)
            .await;
        let analysis = self
            .analyze(&original, &enhanced, settings.preferred_analysis)
            .await?;

        self.progress
            .checkpoint(username, mode, Checkpoint::SavingResults)
            .await;
        let derivative = derivative_name(filename);
        self.storage
            .put_derivative(&derivative, enhanced, DERIVATIVE_CONTENT_TYPE)
            .await
            .map_err(PipelineError::upstream("upload derivative"))?;

        self.progress
            .checkpoint(username, mode, Checkpoint::SavingMetadata)
            .await;
        let draft = MetadataDraft {
            user_id: username.to_string(),
            original_image_url: self.storage.public_url(filename),
            enhanced_image_url: self.storage.public_url(&derivative),
            analysis,
            user_settings: settings,
        };
        let metadata = self.save_metadata(username, filename, draft).await;

        self.cache
            .set(
                &image_key(username, filename),
                &metadata,
                self.config.metadata_cache_ttl,
            )
            .await
            .map_err(PipelineError::upstream("cache metadata"))?;

        let updated_usage = self.usage.record_processed(username).await?;

        let elapsed = started.elapsed();
        self.record_timing(elapsed).await;

        self.progress
            .checkpoint(username, mode, Checkpoint::Complete)
            .await;

        info!(
            filename = %filename,
            process_count = metadata.process_count,
            images_processed = updated_usage.images_processed,
            remaining = updated_usage.remaining_uploads,
            duration_ms = millis(elapsed),
            "Image processed"
        );
        self.emit(PipelineEvent::ImageProcessed {
            user_id: username.to_string(),
            filename: filename.to_string(),
            process_count: metadata.process_count,
            duration_ms: millis(elapsed),
        });

        Ok(ProcessedImage {
            metadata,
            remaining_allowance: updated_usage.remaining_uploads,
            updated_usage,
        })
    }

    async fn analyze(
        &self,
        original: &Bytes,
        enhanced: &Bytes,
        preference: PreferredAnalysis,
    ) -> Result<Analysis> {
        let mut analysis = Analysis::default();

        if preference.includes_color() {
            let source = original.clone();
            analysis.color_analysis = Some(run_blocking(move || Ok(analyze_colors(&source))).await?);
        }

        if preference.includes_objects() {
            let (source, derived) = (original.clone(), enhanced.clone());
            let (original_input, enhanced_input) = futures::try_join!(
                run_blocking(move || preprocess(&source)),
                run_blocking(move || preprocess(&derived))
            )?;
            let (original_labels, enhanced_labels) = futures::try_join!(
                self.classifier.classify(original_input),
                self.classifier.classify(enhanced_input)
            )?;
            analysis.original_classification = Some(original_labels);
            analysis.enhanced_classification = Some(enhanced_labels);
        }

        Ok(analysis)
    }

    /// Upsert metadata once; a store failure is logged and the draft is
    /// returned with a zero process count.
    async fn save_metadata(&self, username: &str, filename: &str, draft: MetadataDraft) -> ImageMetadata {
        let processed_at = self.clock.now();
        match self
            .metadata
            .upsert(username, filename, draft.clone(), processed_at)
            .await
        {
            Ok(metadata) => metadata,
            Err(e) => {
                error!(filename = %filename, error = %e, "Failed to save image metadata");
                ImageMetadata::from_draft(filename, draft, processed_at, 0)
            }
        }
    }

    async fn record_timing(&self, elapsed: Duration) {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        if let Err(e) = self
            .timings
            .record_sample(&self.config.timing_process_type, elapsed_ms, self.clock.now())
            .await
        {
            warn!(elapsed_ms, error = %e, "Failed to record processing time");
        }
    }

    fn emit(&self, event: PipelineEvent) {
        let Some(bus) = &self.events else {
            return;
        };
        if bus.emit(CoreEvent::Pipeline(event)).is_err() {
            trace!("No live subscribers for pipeline event");
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
