use crate::model::artifact::ArtifactManifest;
use image::imageops::FilterType;
use ndarray::{Array, Array4, Axis};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    /// The payload could not be decoded as an image. Client-class failure.
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    /// Post-decode bookkeeping produced the wrong shape. This cannot happen
    /// for any decodable input and is treated as an internal failure.
    #[error("tensor shape error: {0}")]
    Shape(String),
}

/// Deterministic image -> tensor pipeline.
///
/// Decode, resize to the model's fixed spatial dimensions (triangle filter),
/// RGB channel order, then per-channel `(x / 255 - mean) / std` with the
/// constants the artifact manifest declares. The same manifest drives
/// training-time preprocessing, so the two sides cannot drift.
#[derive(Clone, Debug)]
pub struct ImageTransform {
    height: u32,
    width: u32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl ImageTransform {
    pub fn from_manifest(manifest: &ArtifactManifest) -> Self {
        Self {
            height: manifest.input.height,
            width: manifest.input.width,
            mean: manifest.normalization.mean,
            std: manifest.normalization.std,
        }
    }

    /// Shape of every tensor this transform produces: `[1, 3, H, W]`.
    pub fn output_shape(&self) -> [usize; 4] {
        [1, 3, self.height as usize, self.width as usize]
    }

    /// Preprocesses an image from raw bytes into a model-compatible tensor.
    pub fn transform(&self, buffer: &[u8]) -> Result<Array4<f32>, TransformError> {
        // 1. Load image from bytes (guess format)
        let img = image::load_from_memory(buffer)?;

        // 2. Resize
        let resized = img.resize_exact(self.width, self.height, FilterType::Triangle);

        // 3. Normalize & Create Tensor
        let (h, w) = (self.height as usize, self.width as usize);
        let mut normalized_data = Vec::with_capacity(3 * h * w);

        for pixel in resized.to_rgb8().pixels() {
            let (r, g, b) = (pixel[0], pixel[1], pixel[2]);
            normalized_data.push(((r as f32 / 255.0) - self.mean[0]) / self.std[0]);
            normalized_data.push(((g as f32 / 255.0) - self.mean[1]) / self.std[1]);
            normalized_data.push(((b as f32 / 255.0) - self.mean[2]) / self.std[2]);
        }

        // Shape: [H, W, C] -> Permute to [C, H, W] -> Add Batch [1, C, H, W]
        let array = Array::from_shape_vec((h, w, 3), normalized_data)
            .map_err(|e| TransformError::Shape(e.to_string()))?;

        let array = array.permuted_axes([2, 0, 1]);
        let array = array.insert_axis(Axis(0));

        // Ensure standard layout (contiguous)
        Ok(array.as_standard_layout().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use image::RgbImage;
    use std::io::Cursor;

    fn transform() -> ImageTransform {
        ImageTransform::from_manifest(&testutil::manifest())
    }

    fn png_bytes(img: &RgbImage) -> Vec<u8> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
        buffer
    }

    #[test]
    fn test_transform_shape() {
        let t = transform();
        let buffer = png_bytes(&RgbImage::new(10, 10));

        let tensor = t.transform(&buffer).unwrap();
        assert_eq!(tensor.shape(), t.output_shape());
        assert_eq!(tensor.shape(), &[1, 3, 224, 224]);
    }

    #[test]
    fn test_transform_shape_constant_across_input_sizes() {
        let t = transform();
        for (w, h) in [(32, 32), (224, 224), (640, 480), (7, 300)] {
            let buffer = png_bytes(&RgbImage::new(w, h));
            let tensor = t.transform(&buffer).unwrap();
            assert_eq!(tensor.shape(), &[1, 3, 224, 224], "input {w}x{h}");
        }
    }

    #[test]
    fn test_transform_shape_constant_across_formats() {
        let t = transform();
        let img = RgbImage::from_pixel(20, 20, image::Rgb([10, 200, 90]));

        for format in [
            image::ImageFormat::Png,
            image::ImageFormat::Jpeg,
            image::ImageFormat::Bmp,
        ] {
            let mut buffer = Vec::new();
            let mut cursor = Cursor::new(&mut buffer);
            img.write_to(&mut cursor, format).unwrap();
            let tensor = t.transform(&buffer).unwrap();
            assert_eq!(tensor.shape(), &[1, 3, 224, 224], "format {format:?}");
        }
    }

    #[test]
    fn test_normalization_matches_manifest_constants() {
        let t = transform();
        let manifest = testutil::manifest();

        // Uniform gray image: every output value must equal the closed form.
        let buffer = png_bytes(&RgbImage::from_pixel(10, 10, image::Rgb([128, 128, 128])));
        let tensor = t.transform(&buffer).unwrap();

        for channel in 0..3 {
            let expected = ((128.0 / 255.0) - manifest.normalization.mean[channel])
                / manifest.normalization.std[channel];
            let actual = tensor[[0, channel, 0, 0]];
            assert!(
                (actual - expected).abs() < 1e-3,
                "channel {channel}: {actual} vs {expected}"
            );
        }
    }

    #[test]
    fn test_transform_is_deterministic() {
        let t = transform();
        let buffer = png_bytes(&RgbImage::from_pixel(30, 17, image::Rgb([44, 99, 200])));

        let first = t.transform(&buffer).unwrap();
        let second = t.transform(&buffer).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_random_bytes_are_rejected() {
        let t = transform();
        let result = t.transform(b"invalid image data");
        assert!(matches!(result, Err(TransformError::Decode(_))));
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let t = transform();
        let buffer = png_bytes(&RgbImage::new(50, 50));
        let result = t.transform(&buffer[..buffer.len() / 2]);
        assert!(matches!(result, Err(TransformError::Decode(_))));
    }

    #[test]
    fn test_empty_payload_is_rejected() {
        let t = transform();
        assert!(matches!(t.transform(&[]), Err(TransformError::Decode(_))));
    }
}
