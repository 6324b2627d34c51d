//! # Imaging Module
//!
//! CPU-bound image work for the pipeline: the enhancement transform, the
//! dominant-color analyzer, tensor preprocessing and the label classifier
//! with its ONNX Runtime model.
//!
//! Everything here is synchronous except the [`Classifier`], which gates
//! inference on the model having finished loading. Callers on an async runtime
//! should move the synchronous work off the reactor with [`run_blocking`].

pub mod classifier;
pub mod color;
pub mod enhance;
pub mod error;
pub mod onnx;
pub mod tensor;

pub use classifier::{top_predictions, Classifier, LabelModel, ModelLoader, ModelState, TOP_K};
pub use color::analyze_colors;
pub use enhance::{enhance, EnhancementParams};
pub use error::{ImagingError, Result};
pub use onnx::{imagenet_labels, OnnxLabelModel, OnnxModelLoader};
pub use tensor::{preprocess, ImageTensor};

/// Run a synchronous closure on the blocking thread pool.
pub async fn run_blocking<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ImagingError::Task(e.to_string()))?
}
