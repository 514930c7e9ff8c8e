//! Deterministic image preprocessing.
//!
//! Uploaded bytes become a fixed-shape `(1, H, W, 3)` float tensor. Every
//! step is deterministic: the same bytes and config always produce a
//! bit-identical tensor, so confidence scores are reproducible across runs.

use image::imageops::FilterType;
use ndarray::Array4;

use nscan_models::{NormalizationMode, PreprocessConfig};

use crate::error::PreprocessError;

/// ImageNet channel means, in RGB order.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet channel standard deviations, in RGB order.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Convert compressed image bytes into the model input tensor.
///
/// Decodes, converts to 3-channel RGB regardless of the source channel
/// layout, resizes (not crops) to the configured target size with a fixed
/// triangle filter, casts to f32 and normalizes per the configured mode.
pub fn prepare(
    image_bytes: &[u8],
    config: &PreprocessConfig,
) -> Result<Array4<f32>, PreprocessError> {
    let img = image::load_from_memory(image_bytes)
        .map_err(|e| PreprocessError::decode(e.to_string()))?;

    // Convert to RGB before resizing; the resampler must not see alpha.
    let rgb = img.to_rgb8();
    let resized = image::imageops::resize(&rgb, config.width, config.height, FilterType::Triangle);

    let (w, h) = (config.width as usize, config.height as usize);
    let mut data: Vec<f32> = Vec::with_capacity(h * w * 3);

    for y in 0..h {
        for x in 0..w {
            let pixel = resized.get_pixel(x as u32, y as u32);
            for c in 0..3 {
                data.push(normalize(pixel[c], c, config.normalization));
            }
        }
    }

    Array4::from_shape_vec((1, h, w, 3), data)
        .map_err(|e| PreprocessError::Shape(e.to_string()))
}

#[inline]
fn normalize(value: u8, channel: usize, mode: NormalizationMode) -> f32 {
    let scaled = value as f32 / 255.0;
    match mode {
        NormalizationMode::Divide => scaled,
        NormalizationMode::Efficientnet => {
            (scaled - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(img: DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    fn solid_rgb_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        png_bytes(DynamicImage::ImageRgb8(img))
    }

    fn divide_config() -> PreprocessConfig {
        PreprocessConfig::new(224, 224, NormalizationMode::Divide)
    }

    #[test]
    fn test_output_shape_and_dtype() {
        let bytes = solid_rgb_png(100, 100, [255, 0, 0]);
        let tensor = prepare(&bytes, &divide_config()).unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
    }

    #[test]
    fn test_divide_mode_scales_to_unit_interval() {
        let bytes = solid_rgb_png(10, 10, [255, 255, 255]);
        let tensor = prepare(&bytes, &divide_config()).unwrap();
        assert!(tensor.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_efficientnet_mode_differs_from_divide() {
        let bytes = solid_rgb_png(10, 10, [255, 255, 255]);

        let divide = prepare(&bytes, &divide_config()).unwrap();
        let config = PreprocessConfig::new(10, 10, NormalizationMode::Efficientnet);
        let efficientnet = prepare(&bytes, &config).unwrap();

        let d = divide[[0, 0, 0, 0]];
        let e = efficientnet[[0, 0, 0, 0]];
        assert!((d - 1.0).abs() < 1e-6);
        assert!((d - e).abs() > 1e-3, "modes must produce different values");

        // Red channel of a 255 pixel under ImageNet statistics.
        let expected = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        assert!((e - expected).abs() < 1e-5);
    }

    #[test]
    fn test_deterministic_across_calls() {
        let bytes = solid_rgb_png(37, 53, [12, 200, 99]);
        let config = PreprocessConfig::new(224, 224, NormalizationMode::Efficientnet);

        let a = prepare(&bytes, &config).unwrap();
        let b = prepare(&bytes, &config).unwrap();
        assert_eq!(a, b, "same bytes and config must be bit-identical");
    }

    #[test]
    fn test_grayscale_becomes_three_channels() {
        let gray = image::GrayImage::from_pixel(20, 20, image::Luma([128]));
        let bytes = png_bytes(DynamicImage::ImageLuma8(gray));

        let tensor = prepare(&bytes, &divide_config()).unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);

        let r = tensor[[0, 10, 10, 0]];
        let g = tensor[[0, 10, 10, 1]];
        let b = tensor[[0, 10, 10, 2]];
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn test_rgba_alpha_is_dropped() {
        let img = RgbaImage::from_pixel(20, 20, Rgba([10, 20, 30, 128]));
        let bytes = png_bytes(DynamicImage::ImageRgba8(img));

        let tensor = prepare(&bytes, &divide_config()).unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
    }

    #[test]
    fn test_rejects_non_image_bytes() {
        let err = prepare(b"definitely not an image", &divide_config()).unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)));
    }

    #[test]
    fn test_rejects_empty_bytes() {
        let err = prepare(b"", &divide_config()).unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)));
    }
}
