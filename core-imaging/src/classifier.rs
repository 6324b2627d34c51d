//! Label classifier with a readiness gate
//!
//! The model loads once in the background. Calls to [`Classifier::classify`]
//! made before loading finishes wait for it instead of racing the load; once a
//! load has failed, every call fails with [`ImagingError::ModelUnavailable`].

use crate::error::{ImagingError, Result};
use crate::run_blocking;
use crate::tensor::ImageTensor;
use async_trait::async_trait;
use core_library::models::Prediction;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Number of predictions returned per classification.
pub const TOP_K: usize = 5;

/// A loaded model mapping an input tensor to one probability per label.
pub trait LabelModel: Send + Sync {
    fn labels(&self) -> &[String];

    /// Run inference. Called on the blocking thread pool.
    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>>;
}

/// Produces the shared model at startup.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn LabelModel>>;
}

#[derive(Clone)]
pub enum ModelState {
    Loading,
    Ready(Arc<dyn LabelModel>),
    Failed(String),
}

impl ModelState {
    fn is_settled(&self) -> bool {
        !matches!(self, ModelState::Loading)
    }
}

/// Classifier around a single process-wide model.
#[derive(Clone)]
pub struct Classifier {
    state: Arc<watch::Sender<ModelState>>,
}

impl Classifier {
    /// Classifier over an already-loaded model.
    pub fn from_model(model: Arc<dyn LabelModel>) -> Self {
        let (tx, _) = watch::channel(ModelState::Ready(model));
        Self { state: Arc::new(tx) }
    }

    /// Start loading the model on the current runtime and return immediately.
    pub fn spawn_load(loader: Arc<dyn ModelLoader>) -> Self {
        let (tx, _) = watch::channel(ModelState::Loading);
        let state = Arc::new(tx);
        let publisher = Arc::clone(&state);

        tokio::spawn(async move {
            // Inner task so a panicking loader still settles the state
            let load = tokio::spawn(async move { loader.load().await });
            let settled = match load.await {
                Ok(Ok(model)) => {
                    info!(labels = model.labels().len(), "Classifier model loaded");
                    ModelState::Ready(model)
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Classifier model failed to load");
                    ModelState::Failed(match e {
                        ImagingError::ModelUnavailable(reason) => reason,
                        other => other.to_string(),
                    })
                }
                Err(e) => {
                    error!(error = %e, "Classifier model load task aborted");
                    ModelState::Failed(e.to_string())
                }
            };
            publisher.send_replace(settled);
        });

        Self { state }
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), ModelState::Ready(_))
    }

    /// Wait until the model has loaded.
    ///
    /// # Errors
    /// Returns `ModelUnavailable` if loading failed.
    pub async fn wait_until_ready(&self) -> Result<()> {
        self.model().await.map(|_| ())
    }

    async fn model(&self) -> Result<Arc<dyn LabelModel>> {
        let mut state = self.state.subscribe();
        let settled = state
            .wait_for(ModelState::is_settled)
            .await
            .map_err(|_| ImagingError::ModelUnavailable("model state closed".to_string()))?;

        match &*settled {
            ModelState::Ready(model) => Ok(Arc::clone(model)),
            ModelState::Failed(message) => Err(ImagingError::ModelUnavailable(message.clone())),
            ModelState::Loading => Err(ImagingError::ModelUnavailable(
                "model is still loading".to_string(),
            )),
        }
    }

    /// Classify a preprocessed tensor, returning the top five labels.
    pub async fn classify(&self, input: ImageTensor) -> Result<Vec<Prediction>> {
        let model = self.model().await?;
        let predictions = run_blocking(move || {
            let probabilities = model.predict(&input)?;
            top_predictions(model.labels(), &probabilities, TOP_K)
        })
        .await?;

        debug!(
            top = predictions.first().map(|p| p.class_name.as_str()).unwrap_or(""),
            "Classified image"
        );
        Ok(predictions)
    }
}

/// Pick the `k` most probable labels.
///
/// Ordering is by probability descending; equal probabilities keep their
/// label-index order.
pub fn top_predictions(labels: &[String], probabilities: &[f32], k: usize) -> Result<Vec<Prediction>> {
    if labels.len() != probabilities.len() {
        return Err(ImagingError::InvalidModelOutput(format!(
            "{} probabilities for {} labels",
            probabilities.len(),
            labels.len()
        )));
    }
    if probabilities.len() < k {
        return Err(ImagingError::InvalidModelOutput(format!(
            "expected at least {k} outputs, got {}",
            probabilities.len()
        )));
    }

    let mut ranked: Vec<usize> = (0..probabilities.len()).collect();
    ranked.sort_by(|&a, &b| probabilities[b].total_cmp(&probabilities[a]));

    Ok(ranked
        .into_iter()
        .take(k)
        .map(|i| Prediction {
            class_name: labels[i].clone(),
            probability: probabilities[i],
        })
        .collect())
}
