//! ONNX Runtime backed label model
//!
//! Loads an image classifier exported to ONNX (MobileNet by default) and
//! labels its outputs with the ImageNet class table bundled with this crate.
//! The model must accept the NHWC tensor produced by
//! [`preprocess`](crate::tensor::preprocess).

use crate::classifier::{LabelModel, ModelLoader};
use crate::error::{ImagingError, Result};
use crate::run_blocking;
use crate::tensor::ImageTensor;
use async_trait::async_trait;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const IMAGENET_CLASSES: &str = include_str!("../assets/imagenet_classes.txt");

/// The 1000 ImageNet class names in model output order.
pub fn imagenet_labels() -> Vec<String> {
    parse_labels(IMAGENET_CLASSES)
}

fn parse_labels(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// A classifier session plus the labels of its output vector.
pub struct OnnxLabelModel {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    labels: Vec<String>,
}

impl OnnxLabelModel {
    /// Build a CPU session from serialized model bytes.
    pub fn from_memory(model: &[u8], labels: Vec<String>) -> Result<Self> {
        if labels.is_empty() {
            return Err(ImagingError::ModelUnavailable(
                "label table is empty".to_string(),
            ));
        }

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.commit_from_memory(model))
            .map_err(|e| ImagingError::ModelUnavailable(format!("invalid ONNX model: {e}")))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| ImagingError::ModelUnavailable("model has no inputs".to_string()))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| ImagingError::ModelUnavailable("model has no outputs".to_string()))?;

        debug!(input = %input_name, output = %output_name, labels = labels.len(), "Built ONNX session");

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            labels,
        })
    }
}

impl LabelModel for OnnxLabelModel {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>> {
        let value = Value::from_array((input.shape, input.data.clone()))
            .map_err(|e| ImagingError::Inference(e.to_string()))?;

        let raw = {
            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![self.input_name.as_str() => value])
                .map_err(|e| ImagingError::Inference(e.to_string()))?;
            let (_shape, data) = outputs[self.output_name.as_str()]
                .try_extract_tensor::<f32>()
                .map_err(|e| ImagingError::InvalidModelOutput(e.to_string()))?;
            data.to_vec()
        };

        Ok(normalize_output(raw, self.labels.len()))
    }
}

/// Align raw model output with the label table.
///
/// TensorFlow exports of MobileNet emit a leading background class, which is
/// dropped. Logits are turned into probabilities with a softmax.
fn normalize_output(mut output: Vec<f32>, labels: usize) -> Vec<f32> {
    if output.len() == labels + 1 {
        output.remove(0);
    }

    let sum: f32 = output.iter().sum();
    let is_distribution = output.iter().all(|p| (0.0..=1.0).contains(p)) && (sum - 1.0).abs() < 1e-3;
    if is_distribution || output.is_empty() {
        return output;
    }

    let max = output.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = output.iter().map(|v| (v - max).exp()).collect();
    let total: f32 = exp.iter().sum();
    exp.into_iter().map(|v| v / total).collect()
}

/// Loads an [`OnnxLabelModel`] from disk.
#[derive(Debug, Clone)]
pub struct OnnxModelLoader {
    model_path: PathBuf,
    labels_path: Option<PathBuf>,
}

impl OnnxModelLoader {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            labels_path: None,
        }
    }

    /// Read labels from a newline-separated file instead of the ImageNet table.
    pub fn with_labels_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.labels_path = Some(path.into());
        self
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    async fn labels(&self) -> Result<Vec<String>> {
        match &self.labels_path {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .map(|text| parse_labels(&text))
                .map_err(|e| {
                    ImagingError::ModelUnavailable(format!("{}: {e}", path.display()))
                }),
            None => Ok(imagenet_labels()),
        }
    }
}

#[async_trait]
impl ModelLoader for OnnxModelLoader {
    async fn load(&self) -> Result<Arc<dyn LabelModel>> {
        let bytes = tokio::fs::read(&self.model_path).await.map_err(|e| {
            ImagingError::ModelUnavailable(format!("{}: {e}", self.model_path.display()))
        })?;
        let labels = self.labels().await?;

        info!(
            path = %self.model_path.display(),
            size_bytes = bytes.len(),
            labels = labels.len(),
            "Loading ONNX classifier"
        );
        let model = run_blocking(move || OnnxLabelModel::from_memory(&bytes, labels)).await?;
        Ok(Arc::new(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imagenet_table() {
        let labels = imagenet_labels();
        assert_eq!(labels.len(), 1000);
        assert_eq!(labels[0], "tench");
        assert_eq!(labels[207], "golden retriever");
        assert_eq!(labels[281], "tabby");
        assert_eq!(labels[954], "banana");
        assert_eq!(labels[999], "toilet tissue");
    }

    #[test]
    fn test_parse_labels_skips_blank_lines() {
        assert_eq!(parse_labels("cat\n\n  dog \n"), vec!["cat", "dog"]);
    }

    #[test]
    fn test_normalize_drops_background_class() {
        let output = normalize_output(vec![0.2, 0.6, 0.2], 2);
        assert_eq!(output.len(), 2);
        assert!(output[0] > output[1]);
    }

    #[test]
    fn test_normalize_keeps_probabilities() {
        let output = normalize_output(vec![0.25, 0.5, 0.25], 3);
        assert_eq!(output, vec![0.25, 0.5, 0.25]);
    }

    #[test]
    fn test_normalize_applies_softmax_to_logits() {
        let output = normalize_output(vec![2.0, -1.0, 0.5], 3);
        let sum: f32 = output.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(output[0] > output[2] && output[2] > output[1]);
    }

    #[test]
    fn test_empty_labels_rejected() {
        let err = OnnxLabelModel::from_memory(b"", Vec::new()).err().unwrap();
        assert!(matches!(err, ImagingError::ModelUnavailable(_)));
    }
}
