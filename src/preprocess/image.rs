//! Image decoding and normalization for the imaging classifier.
//!
//! Uploads are decoded, converted to RGB and resized to the model's fixed
//! 224x224 input (bilinear, aspect ratio not preserved, matching training).
//! Normalization divides by 255 and adds the leading batch axis.

use std::io::Cursor;

use image::imageops::FilterType;
use image::io::Reader;
use image::{GenericImageView, RgbImage};
use ndarray::{Array3, Array4, Axis};
use tracing::debug;

use crate::error::InferenceError;

/// Square edge length the imaging classifier was trained on.
pub const MODEL_INPUT_SIZE: u32 = 224;

/// RGB channel count.
pub const CHANNELS: usize = 3;

/// Largest edge accepted before decoding. The compressed size is capped by
/// the upload body limit; this caps the decoded buffer.
pub const MAX_INPUT_DIMENSION: u32 = 4096;

/// Decoded image as a `(height, width, 3)` array of RGB bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pixels: Array3<u8>,
}

impl ImageTensor {
    pub fn from_rgb_image(image: RgbImage) -> Result<Self, InferenceError> {
        let (width, height) = image.dimensions();
        let raw = image.into_raw();
        let pixels = Array3::from_shape_vec((height as usize, width as usize, CHANNELS), raw)
            .map_err(|e| InferenceError::Preprocess(format!("RGB buffer: {e}")))?;
        Ok(Self { pixels })
    }

    /// `(height, width, channels)`
    pub fn shape(&self) -> (usize, usize, usize) {
        self.pixels.dim()
    }

    pub fn pixels(&self) -> &Array3<u8> {
        &self.pixels
    }

    /// Scale to `[0, 1]` and add the batch axis: `(1, H, W, 3)`.
    pub fn normalize(&self) -> Array4<f32> {
        self.pixels
            .mapv(|v| f32::from(v) / 255.0)
            .insert_axis(Axis(0))
    }
}

/// Decode JPEG/PNG upload bytes into a model-sized RGB tensor.
pub fn decode_upload(bytes: &[u8]) -> Result<ImageTensor, InferenceError> {
    if bytes.is_empty() {
        return Err(InferenceError::InvalidImage("empty upload".into()));
    }
    check_dimensions(bytes)?;

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| InferenceError::InvalidImage(format!("Failed to decode image: {e}")))?;
    let (orig_w, orig_h) = decoded.dimensions();

    let rgb = decoded.to_rgb8();
    let resized = if (orig_w, orig_h) == (MODEL_INPUT_SIZE, MODEL_INPUT_SIZE) {
        rgb
    } else {
        image::imageops::resize(&rgb, MODEL_INPUT_SIZE, MODEL_INPUT_SIZE, FilterType::Triangle)
    };

    debug!(orig_w, orig_h, "Decoded upload resized to model input");
    ImageTensor::from_rgb_image(resized)
}

/// Read the header only and refuse images whose decoded buffer would be
/// out of proportion to the model input.
fn check_dimensions(bytes: &[u8]) -> Result<(), InferenceError> {
    let invalid = |e: &dyn std::fmt::Display| {
        InferenceError::InvalidImage(format!("Failed to read image header: {e}"))
    };
    let (width, height) = Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| invalid(&e))?
        .into_dimensions()
        .map_err(|e| invalid(&e))?;

    if width == 0 || height == 0 {
        return Err(InferenceError::InvalidImage(format!(
            "image is {width}x{height}"
        )));
    }
    if width > MAX_INPUT_DIMENSION || height > MAX_INPUT_DIMENSION {
        return Err(InferenceError::InvalidImage(format!(
            "image is {width}x{height}, limit is {MAX_INPUT_DIMENSION} per side"
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn encode_png(img: &RgbImage) -> Vec<u8> {
    use image::{DynamicImage, ImageOutputFormat};

    let dynamic = DynamicImage::ImageRgb8(img.clone());
    let mut cursor = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .unwrap();
    cursor.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn decodes_and_resizes_to_model_input() {
        let img = RgbImage::from_pixel(64, 32, Rgb([10, 20, 30]));
        let tensor = decode_upload(&encode_png(&img)).unwrap();
        assert_eq!(tensor.shape(), (224, 224, 3));
        // Uniform image stays uniform through bilinear resize
        assert_eq!(tensor.pixels()[[100, 100, 0]], 10);
        assert_eq!(tensor.pixels()[[100, 100, 2]], 30);
    }

    #[test]
    fn keeps_channel_order_rgb() {
        let img = RgbImage::from_pixel(224, 224, Rgb([255, 0, 0]));
        let tensor = decode_upload(&encode_png(&img)).unwrap();
        assert_eq!(tensor.pixels()[[0, 0, 0]], 255);
        assert_eq!(tensor.pixels()[[0, 0, 1]], 0);
        assert_eq!(tensor.pixels()[[0, 0, 2]], 0);
    }

    #[test]
    fn normalize_adds_batch_axis_and_scales() {
        let img = RgbImage::from_pixel(224, 224, Rgb([255, 0, 51]));
        let tensor = ImageTensor::from_rgb_image(img).unwrap();
        let batch = tensor.normalize();
        assert_eq!(batch.shape(), &[1, 224, 224, 3]);
        assert_eq!(batch[[0, 5, 5, 0]], 1.0);
        assert_eq!(batch[[0, 5, 5, 1]], 0.0);
        assert!((batch[[0, 5, 5, 2]] - 0.2).abs() < 1e-6);
        assert!(batch.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn rejects_non_image_bytes() {
        let err = decode_upload(b"definitely not an image").unwrap_err();
        assert!(matches!(err, InferenceError::InvalidImage(_)));
    }

    #[test]
    fn rejects_oversized_dimensions_before_decoding() {
        // Flat images compress to a few KB whatever their size, so only the
        // header dimensions can stop them.
        let img = RgbImage::from_pixel(MAX_INPUT_DIMENSION + 1, 8, Rgb([0, 0, 0]));
        let err = decode_upload(&encode_png(&img)).unwrap_err();
        match err {
            InferenceError::InvalidImage(msg) => assert!(msg.contains("limit is 4096")),
            other => panic!("expected InvalidImage, got {other:?}"),
        }

        let tall = RgbImage::from_pixel(8, MAX_INPUT_DIMENSION + 1, Rgb([0, 0, 0]));
        assert!(matches!(
            decode_upload(&encode_png(&tall)),
            Err(InferenceError::InvalidImage(_))
        ));
    }

    #[test]
    fn accepts_largest_allowed_edge() {
        let img = RgbImage::from_pixel(MAX_INPUT_DIMENSION, 4, Rgb([7, 7, 7]));
        let tensor = decode_upload(&encode_png(&img)).unwrap();
        assert_eq!(tensor.shape(), (224, 224, 3));
    }

    #[test]
    fn rejects_empty_upload() {
        let err = decode_upload(&[]).unwrap_err();
        assert!(matches!(err, InferenceError::InvalidImage(_)));
    }
}
