//! Enhancement transform
//!
//! Produces the derivative image: bounded resize, brightness and saturation
//! lift, optional unsharp mask, JPEG re-encode.

use crate::error::{ImagingError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use tracing::debug;

pub const MAX_WIDTH: u32 = 800;
pub const MAX_HEIGHT: u32 = 600;

/// Filter parameters derived from an enhancement level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhancementParams {
    pub brightness: f32,
    pub saturation: f32,
    /// Unsharp-mask sigma; zero disables sharpening
    pub sharpen_sigma: f32,
}

impl EnhancementParams {
    pub fn from_level(level: u32) -> Self {
        let level = level as f32;
        Self {
            brightness: 1.0 + 0.1 * level,
            saturation: 1.0 + 0.1 * level,
            sharpen_sigma: 0.5 * level,
        }
    }

    fn is_identity_color(&self) -> bool {
        self.brightness == 1.0 && self.saturation == 1.0
    }
}

/// Enhance an encoded image and return JPEG bytes.
///
/// The output fits within 800x600 with the source aspect ratio preserved;
/// smaller sources are scaled up to the bound.
pub fn enhance(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let source = image::load_from_memory(data).map_err(|e| ImagingError::Decode(e.to_string()))?;
    let params = EnhancementParams::from_level(level);

    let resized = source.resize(MAX_WIDTH, MAX_HEIGHT, FilterType::Lanczos3);
    let mut rgb = resized.to_rgb8();

    if !params.is_identity_color() {
        modulate(&mut rgb, params.brightness, params.saturation);
    }

    let mut output = DynamicImage::ImageRgb8(rgb);
    if params.sharpen_sigma > 0.0 {
        output = output.unsharpen(params.sharpen_sigma, 0);
    }

    let mut buffer = Vec::new();
    output
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
        .map_err(|e| ImagingError::Encode(e.to_string()))?;

    debug!(
        level,
        source_width = source.width(),
        source_height = source.height(),
        width = output.width(),
        height = output.height(),
        size = buffer.len(),
        "Enhanced image"
    );
    Ok(buffer)
}

/// Scale brightness, then push each channel away from the pixel's luma.
fn modulate(image: &mut RgbImage, brightness: f32, saturation: f32) {
    for pixel in image.pixels_mut() {
        let [r, g, b] = pixel.0.map(|c| c as f32 * brightness);
        let luma = 0.299 * r + 0.587 * g + 0.114 * b;
        pixel.0 = [r, g, b].map(|c| (luma + (c - luma) * saturation).round().clamp(0.0, 255.0) as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb};

    fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn decode(data: &[u8]) -> DynamicImage {
        image::load_from_memory_with_format(data, ImageFormat::Jpeg).unwrap()
    }

    #[test]
    fn test_params_from_level() {
        let params = EnhancementParams::from_level(2);
        assert!((params.brightness - 1.2).abs() < 1e-6);
        assert!((params.saturation - 1.2).abs() < 1e-6);
        assert!((params.sharpen_sigma - 1.0).abs() < 1e-6);

        let zero = EnhancementParams::from_level(0);
        assert_eq!(zero.sharpen_sigma, 0.0);
        assert!(zero.is_identity_color());
    }

    #[test]
    fn test_output_fits_bounds_and_keeps_aspect() {
        let landscape = decode(&enhance(&png(1600, 1200, [10, 120, 200]), 1).unwrap());
        assert_eq!(landscape.dimensions(), (800, 600));

        let portrait = decode(&enhance(&png(400, 1000, [10, 120, 200]), 1).unwrap());
        assert_eq!(portrait.dimensions(), (240, 600));
    }

    #[test]
    fn test_small_images_are_upscaled() {
        let out = decode(&enhance(&png(80, 60, [90, 90, 90]), 0).unwrap());
        assert_eq!(out.dimensions(), (800, 600));
    }

    #[test]
    fn test_brightness_lifts_gray() {
        let out = decode(&enhance(&png(64, 48, [100, 100, 100]), 5).unwrap()).to_rgb8();
        let center = out.get_pixel(out.width() / 2, out.height() / 2);
        // Gray stays gray under saturation; brightness 1.5x of 100 is 150
        for channel in center.0 {
            assert!((140..=160).contains(&channel), "unexpected channel {channel}");
        }
    }

    #[test]
    fn test_modulate_saturation_moves_away_from_luma() {
        let mut img = RgbImage::from_pixel(1, 1, Rgb([200, 100, 100]));
        modulate(&mut img, 1.0, 1.5);
        let [r, g, b] = img.get_pixel(0, 0).0;
        assert!(r > 200);
        assert!(g < 100);
        assert_eq!(g, b);
    }

    #[test]
    fn test_rejects_undecodable_input() {
        assert!(matches!(
            enhance(b"not an image", 1),
            Err(ImagingError::Decode(_))
        ));
    }
}
