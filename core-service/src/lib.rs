//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided collaborators (object storage, cache, user
//! and metadata stores, timing store, model loader) into the image pipeline
//! and exposes the operations a front end calls. Server deployments typically
//! enable the `server-shims` feature, which provides [`bootstrap`] on top of
//! the adapters in `bridge-server`.

pub mod accounts;
pub mod admin;
pub mod error;

pub use accounts::UserStats;
pub use admin::AdminStats;
pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{
    cache::CacheStore,
    push::ProgressRecord,
    storage::{ObjectStorage, PresignedUrl},
    time::Clock,
};
use core_imaging::{Classifier, ModelLoader, OnnxModelLoader};
use core_library::models::{ImageMetadata, User};
use core_library::repositories::{MetadataStore, TimingStore, UserStore};
use core_pipeline::{BatchOutcome, ImagePipeline, JsonCache, PipelineDependencies, ProcessedImage};
use core_runtime::config::PipelineConfig;
use core_runtime::events::{EventBus, EventStream};
use tracing::info;

/// Aggregated handle to all collaborators the core requires.
pub struct CoreDependencies {
    pub storage: Arc<dyn ObjectStorage>,
    pub cache: Arc<dyn CacheStore>,
    pub users: Arc<dyn UserStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub timings: Arc<dyn TimingStore>,
    pub model_loader: Arc<dyn ModelLoader>,
    pub clock: Arc<dyn Clock>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit handles.
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        cache: Arc<dyn CacheStore>,
        users: Arc<dyn UserStore>,
        metadata: Arc<dyn MetadataStore>,
        timings: Arc<dyn TimingStore>,
        model_loader: Arc<dyn ModelLoader>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            cache,
            users,
            metadata,
            timings,
            model_loader,
            clock,
        }
    }
}

/// Progress state handed to a newly connected client.
pub struct ProgressSubscription {
    /// Last cached record, if a run is in flight or recently finished
    pub snapshot: Option<ProgressRecord>,
    /// Live events for the user from this point on
    pub stream: EventStream,
}

/// Primary façade exposed to front ends.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<PipelineConfig>,
    pipeline: Arc<ImagePipeline>,
    events: Arc<EventBus>,
    classifier: Classifier,
    storage: Arc<dyn ObjectStorage>,
    users: Arc<dyn UserStore>,
    metadata: Arc<dyn MetadataStore>,
    timings: Arc<dyn TimingStore>,
    cache: JsonCache,
    clock: Arc<dyn Clock>,
}

impl CoreService {
    /// Create a new service and start loading the classifier model.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: PipelineConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let events = Arc::new(EventBus::new(config.event_buffer_size));
        let classifier = Classifier::spawn_load(deps.model_loader);

        let pipeline = ImagePipeline::new(
            Arc::clone(&config),
            PipelineDependencies {
                storage: Arc::clone(&deps.storage),
                cache: Arc::clone(&deps.cache),
                progress: events.clone(),
                users: Arc::clone(&deps.users),
                metadata: Arc::clone(&deps.metadata),
                timings: Arc::clone(&deps.timings),
                classifier: classifier.clone(),
                clock: Arc::clone(&deps.clock),
            },
        )
        .with_event_bus(Arc::clone(&events));

        info!(
            bucket = %config.bucket_name,
            region = %config.region,
            enforce_daily_limit = config.enforce_daily_limit,
            "Core service initialized"
        );

        Ok(Self {
            pipeline: Arc::new(pipeline),
            events,
            classifier,
            storage: deps.storage,
            users: deps.users,
            metadata: deps.metadata,
            timings: deps.timings,
            cache: JsonCache::new(deps.cache),
            clock: deps.clock,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Event bus carrying progress and pipeline lifecycle events.
    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    /// Wait for the classifier model to finish loading.
    pub async fn wait_until_ready(&self) -> Result<()> {
        Ok(self.classifier.wait_until_ready().await?)
    }

    pub fn is_ready(&self) -> bool {
        self.classifier.is_ready()
    }

    pub async fn process_one(&self, filename: &str, username: &str) -> Result<ProcessedImage> {
        Ok(self.pipeline.process_one(filename, username).await?)
    }

    pub async fn process_batch(&self, filenames: &[String], username: &str) -> Result<BatchOutcome> {
        Ok(self.pipeline.process_batch(filenames, username).await?)
    }

    pub async fn image_metadata(&self, username: &str, filename: &str) -> Result<Option<ImageMetadata>> {
        Ok(self.pipeline.image_metadata(username, filename).await?)
    }

    pub async fn latest_progress(&self, user_id: &str) -> Result<Option<ProgressRecord>> {
        Ok(self.pipeline.latest_progress(user_id).await?)
    }

    /// Subscribe to a user's progress, starting with the cached snapshot.
    pub async fn subscribe_progress(&self, user_id: &str) -> Result<ProgressSubscription> {
        let user_id = User::canonical_username(user_id);
        // Subscribe before reading the snapshot so nothing falls in between
        let stream = self.events.subscribe_user(user_id.as_str());
        let snapshot = self.pipeline.latest_progress(&user_id).await?;
        Ok(ProgressSubscription { snapshot, stream })
    }

    /// Pre-signed URL a client uploads an original to.
    pub async fn upload_url(&self, filename: &str, content_type: &str) -> Result<PresignedUrl> {
        if filename.trim().is_empty() {
            return Err(CoreError::InvalidInput("File name is undefined or empty".to_string()));
        }
        Ok(self.storage.presign_upload(filename, content_type).await?)
    }

    /// Public URL that makes browsers save `filename` instead of showing it.
    pub fn download_url(&self, filename: &str) -> String {
        self.storage.download_url(filename)
    }
}

/// ONNX classifier loader described by `model_path` and `model_labels_path`.
///
/// # Errors
/// `InitializationFailed` when no model path is configured.
pub fn onnx_model_loader(config: &PipelineConfig) -> Result<OnnxModelLoader> {
    let path = config.model_path.as_ref().ok_or_else(|| {
        CoreError::InitializationFailed(format!(
            "{} is required to load the classifier",
            core_runtime::config::keys::MODEL_PATH
        ))
    })?;

    let loader = OnnxModelLoader::new(path);
    Ok(match &config.model_labels_path {
        Some(labels) => loader.with_labels_path(labels),
        None => loader,
    })
}

/// Convenience bootstrapper for server hosts.
///
/// Uses pre-signed HTTP object storage, an in-process LRU cache sized by
/// `cache_capacity`, a SQLite timing store at `timing_database_path`
/// (in memory when unset) and the ONNX classifier at `model_path`. User and
/// metadata stores come from the host.
///
/// ```ignore
/// let config = PipelineConfig::from_env()?;
/// let core = core_service::bootstrap(config, signer, users, metadata).await?;
/// core.wait_until_ready().await?;
/// ```
#[cfg(feature = "server-shims")]
pub async fn bootstrap(
    config: PipelineConfig,
    signer: Arc<dyn bridge_traits::storage::UrlSigner>,
    users: Arc<dyn UserStore>,
    metadata: Arc<dyn MetadataStore>,
) -> Result<CoreService> {
    use bridge_server::{HttpObjectStorage, LruTtlCache};
    use bridge_traits::time::SystemClock;
    use core_library::repositories::SqliteTimingStore;

    config.validate()?;
    let model_loader = onnx_model_loader(&config)?;

    let storage = HttpObjectStorage::new(signer, config.cdn_domain.clone())?
        .with_url_ttl(config.presigned_url_ttl);
    let timings = match &config.timing_database_path {
        Some(path) => SqliteTimingStore::new(path).await?,
        None => SqliteTimingStore::in_memory().await?,
    };

    let deps = CoreDependencies::new(
        Arc::new(storage),
        Arc::new(LruTtlCache::new(config.cache_capacity)),
        users,
        metadata,
        Arc::new(timings),
        Arc::new(model_loader),
        Arc::new(SystemClock),
    );
    CoreService::new(config, deps)
}
