//! Loading and running a real ONNX model file

use core_imaging::{Classifier, ImageTensor, ImagingError, LabelModel, ModelLoader, OnnxModelLoader};
use std::path::PathBuf;
use std::sync::Arc;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Flatten followed by softmax, with dynamic height, width and channels.
fn loader() -> OnnxModelLoader {
    OnnxModelLoader::new(fixture("flatten_softmax.onnx")).with_labels_path(fixture("six_labels.txt"))
}

fn tensor(data: Vec<f32>, shape: [usize; 4]) -> ImageTensor {
    ImageTensor { data, shape }
}

#[tokio::test]
async fn test_loads_model_and_ranks_outputs() {
    let model = loader().load().await.unwrap();
    assert_eq!(model.labels().len(), 6);

    let probabilities = model
        .predict(&tensor(vec![0.1, 0.9, 0.3, 0.5, 0.2, 0.0], [1, 1, 2, 3]))
        .unwrap();
    assert_eq!(probabilities.len(), 6);
    let sum: f32 = probabilities.iter().sum();
    assert!((sum - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn test_classifier_over_onnx_model() {
    let classifier = Classifier::spawn_load(Arc::new(loader()));
    classifier.wait_until_ready().await.unwrap();

    let top = classifier
        .classify(tensor(vec![0.1, 0.9, 0.3, 0.5, 0.2, 0.0], [1, 1, 2, 3]))
        .await
        .unwrap();
    let names: Vec<&str> = top.iter().map(|p| p.class_name.as_str()).collect();
    assert_eq!(names, vec!["green", "cyan", "blue", "magenta", "red"]);
}

#[tokio::test]
async fn test_leading_background_output_is_dropped() {
    let model = loader().load().await.unwrap();

    // Seven outputs for six labels: the first is treated as background
    let probabilities = model
        .predict(&tensor(vec![5.0, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6], [1, 7, 1, 1]))
        .unwrap();
    assert_eq!(probabilities.len(), 6);
    assert!(probabilities.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn test_missing_model_file_is_unavailable() {
    let classifier = Classifier::spawn_load(Arc::new(OnnxModelLoader::new(fixture("absent.onnx"))));

    let err = classifier.wait_until_ready().await.unwrap_err();
    assert!(matches!(err, ImagingError::ModelUnavailable(ref m) if m.contains("absent.onnx")));
    assert_eq!(err.to_string().matches("Model unavailable").count(), 1);
}

#[tokio::test]
async fn test_corrupt_model_file_is_unavailable() {
    let err = OnnxModelLoader::new(fixture("six_labels.txt"))
        .load()
        .await
        .err()
        .unwrap();
    assert!(matches!(err, ImagingError::ModelUnavailable(_)));
}
