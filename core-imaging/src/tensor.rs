//! Classifier input tensors

use crate::error::{ImagingError, Result};
use image::imageops::FilterType;

pub const INPUT_SIZE: u32 = 224;
pub const CHANNELS: usize = 3;

/// A dense NHWC float tensor with batch size one.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub data: Vec<f32>,
    /// `[batch, height, width, channels]`
    pub shape: [usize; 4],
}

impl ImageTensor {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Decode an image into a 224x224 RGB tensor scaled to `0.0..=1.0`.
///
/// The source is center-cropped to a square before scaling.
pub fn preprocess(data: &[u8]) -> Result<ImageTensor> {
    let img = image::load_from_memory(data).map_err(|e| ImagingError::Decode(e.to_string()))?;
    let rgb = img
        .resize_to_fill(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
        .to_rgb8();

    let data = rgb
        .into_raw()
        .into_iter()
        .map(|v| f32::from(v) / 255.0)
        .collect();

    let side = INPUT_SIZE as usize;
    Ok(ImageTensor {
        data,
        shape: [1, side, side, CHANNELS],
    })
}
