//! Dominant color analysis over a 16-level-per-channel histogram

use core_library::models::{ColorAnalysis, ColorShare};
use std::collections::HashMap;
use tracing::warn;

const BUCKET: u8 = 16;
const TOP_COLORS: usize = 5;

/// Analyze the dominant colors of an encoded image.
///
/// Never fails: undecodable input yields an empty result carrying the error.
pub fn analyze_colors(data: &[u8]) -> ColorAnalysis {
    let rgb = match image::load_from_memory(data) {
        Ok(img) => img.to_rgb8(),
        Err(e) => {
            warn!(error = %e, "Color analysis could not decode image");
            return ColorAnalysis::failed(e.to_string());
        }
    };

    let (width, height) = rgb.dimensions();
    let total = u64::from(width) * u64::from(height);
    if total == 0 {
        return ColorAnalysis::failed("Image has no pixels");
    }

    // Insertion order doubles as the tie-break for equal counts
    let mut index: HashMap<[u8; 3], usize> = HashMap::new();
    let mut buckets: Vec<([u8; 3], u64)> = Vec::new();
    for pixel in rgb.pixels() {
        let key = pixel.0.map(quantize);
        match index.get(&key) {
            Some(&slot) => buckets[slot].1 += 1,
            None => {
                index.insert(key, buckets.len());
                buckets.push((key, 1));
            }
        }
    }

    buckets.sort_by(|a, b| b.1.cmp(&a.1));

    let dominant_colors = buckets
        .into_iter()
        .take(TOP_COLORS)
        .map(|([r, g, b], count)| ColorShare {
            color: format!("#{r:02x}{g:02x}{b:02x}"),
            percentage: percentage(count, total),
        })
        .collect();

    ColorAnalysis {
        dominant_colors,
        width,
        height,
        error: None,
    }
}

fn quantize(channel: u8) -> u8 {
    channel / BUCKET * BUCKET
}

/// Share in percent, truncated to two decimals so shares never sum past 100.
///
/// Truncation differs from round-half formatting in the last digit: two of
/// three pixels give 66.66 rather than 66.67.
fn percentage(count: u64, total: u64) -> f64 {
    (count * 10_000 / total) as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn encode(img: RgbImage) -> Vec<u8> {
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_solid_image() {
        let analysis = analyze_colors(&encode(RgbImage::from_pixel(40, 30, Rgb([255, 0, 0]))));

        assert_eq!(analysis.width, 40);
        assert_eq!(analysis.height, 30);
        assert!(analysis.error.is_none());
        assert_eq!(
            analysis.dominant_colors,
            vec![ColorShare {
                color: "#f00000".to_string(),
                percentage: 100.0,
            }]
        );
    }

    #[test]
    fn test_quantization_merges_nearby_shades() {
        let mut img = RgbImage::from_pixel(4, 1, Rgb([17, 33, 47]));
        img.put_pixel(0, 0, Rgb([31, 32, 32]));

        let analysis = analyze_colors(&encode(img));
        assert_eq!(analysis.dominant_colors.len(), 1);
        assert_eq!(analysis.dominant_colors[0].color, "#102020");
    }

    #[test]
    fn test_top_five_ordering_and_ties() {
        // Six colors; black covers 5 pixels, the rest 1..=3 with a tie
        let colors: [([u8; 3], u32); 6] = [
            ([0, 0, 0], 5),
            ([255, 255, 255], 1),
            ([64, 0, 0], 3),
            ([0, 64, 0], 3),
            ([0, 0, 64], 2),
            ([128, 128, 128], 2),
        ];
        let total: u32 = colors.iter().map(|(_, n)| n).sum();
        let mut img = RgbImage::new(total, 1);
        let mut x = 0;
        for (rgb, n) in colors {
            for _ in 0..n {
                img.put_pixel(x, 0, Rgb(rgb));
                x += 1;
            }
        }

        let analysis = analyze_colors(&encode(img));
        let hexes: Vec<&str> = analysis
            .dominant_colors
            .iter()
            .map(|c| c.color.as_str())
            .collect();
        assert_eq!(
            hexes,
            vec!["#000000", "#400000", "#004000", "#000040", "#808080"]
        );
        assert_eq!(analysis.dominant_colors[0].percentage, 31.25);

        let sum: f64 = analysis.dominant_colors.iter().map(|c| c.percentage).sum();
        assert!(sum <= 100.0);
    }

    #[test]
    fn test_percentages_never_exceed_total() {
        let mut img = RgbImage::from_pixel(3, 1, Rgb([0, 0, 0]));
        img.put_pixel(1, 0, Rgb([255, 255, 255]));
        img.put_pixel(2, 0, Rgb([0, 128, 255]));

        let analysis = analyze_colors(&encode(img));
        for share in &analysis.dominant_colors {
            assert_eq!(share.percentage, 33.33);
        }
    }

    #[test]
    fn test_percentages_truncate_last_digit() {
        let mut img = RgbImage::from_pixel(3, 1, Rgb([0, 0, 0]));
        img.put_pixel(2, 0, Rgb([255, 255, 255]));

        let analysis = analyze_colors(&encode(img));
        let shares: Vec<f64> = analysis.dominant_colors.iter().map(|c| c.percentage).collect();
        assert_eq!(shares, vec![66.66, 33.33]);
    }

    #[test]
    fn test_undecodable_input_is_reported() {
        let analysis = analyze_colors(b"garbage");
        assert!(analysis.dominant_colors.is_empty());
        assert_eq!((analysis.width, analysis.height), (0, 0));
        assert!(analysis.error.is_some());
    }
}
